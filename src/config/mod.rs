//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, variables de entorno
//! y los parámetros del motor de conciliación.

pub mod database;
pub mod environment;
pub mod reconciliation;

pub use database::DatabaseConfig;
pub use environment::{EnvironmentConfig, StoreBackend};
pub use reconciliation::ReconciliationConfig;
