//! Configuración de conexión a PostgreSQL
//!
//! Este módulo abre el pool de conexiones y aplica las migraciones embebidas.

use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::utils::errors::AppResult;

/// Pool de PostgreSQL con el esquema migrado
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Conecta con la configuración indicada y ejecuta las migraciones
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        if let Some(url) = config.url.as_deref() {
            log::info!("🔌 Conectando a {}", mask_database_url(url));
        }

        let pool = config.create_pool().await?;
        let connection = Self { pool };
        connection.run_migrations().await?;

        log::info!("✅ Base de datos conectada y migrada");
        Ok(connection)
    }

    /// Conecta usando las variables de entorno
    pub async fn new_default() -> AppResult<Self> {
        Self::new(&DatabaseConfig::from_env()).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ejecutar migraciones de la base de datos
    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Función helper para enmascarar la URL de la base de datos en logs
fn mask_database_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(_colon_pos) = url[..at_pos].rfind(':') {
            let protocol = &url[..url.find("://").map_or(0, |p| p + 3)];
            let host = &url[at_pos + 1..];
            format!("{}***:***@{}", protocol, host)
        } else {
            url.to_string()
        }
    } else {
        url.to_string()
    }
}
