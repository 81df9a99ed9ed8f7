use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use dotenvy::dotenv;

use fleet_mileage::config::{EnvironmentConfig, ReconciliationConfig, StoreBackend};
use fleet_mileage::database::DatabaseConnection;
use fleet_mileage::repositories::{FleetStore, InMemoryFleetRepository, PgFleetRepository};
use fleet_mileage::{create_app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging (los `log::` de los servicios pasan por el mismo subscriber)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("🚚 Fleet Mileage - conciliación de kilometraje");
    info!("================================================");

    let config = EnvironmentConfig::from_env();
    let reconciliation = ReconciliationConfig::from_env();
    info!(
        "⚙️ Ventana {} | ritmo por defecto {} km/día | backend {}",
        reconciliation.window_size, reconciliation.default_daily_rate, config.store_backend
    );

    let store: Arc<dyn FleetStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let db_connection = match DatabaseConnection::new_default().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {}", e);
                    return Err(anyhow::anyhow!("Error de base de datos: {}", e));
                }
            };
            Arc::new(PgFleetRepository::new(db_connection.pool().clone()))
        }
        StoreBackend::Memory => {
            info!("🧪 Usando almacén en memoria (los datos no persisten)");
            Arc::new(InMemoryFleetRepository::new())
        }
    };

    let addr: SocketAddr = config.server_url().parse()?;
    let app = create_app(AppState::new(store, config, reconciliation));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health");
    info!("   POST /api/companies | /api/companies/:id/vehicles");
    info!("   POST /api/vehicles/:id/readings | /api/vehicles/:id/maintenance");
    info!("   PUT  /api/readings/:id");
    info!("   GET  /api/readings/:id/conflicts | correlation | correction");
    info!("   GET  /api/soft-delete/:entity/:id/deletion-preview | restoration-preview");
    info!("   POST /api/soft-delete/:entity/:id/delete | restore");
    info!("   GET  /api/soft-delete/audit-logs");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de señales: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
