//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::{EnvironmentConfig, ReconciliationConfig};
use crate::repositories::FleetStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FleetStore>,
    pub config: EnvironmentConfig,
    pub reconciliation: ReconciliationConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn FleetStore>, config: EnvironmentConfig, reconciliation: ReconciliationConfig) -> Self {
        Self {
            store,
            config,
            reconciliation,
        }
    }
}
