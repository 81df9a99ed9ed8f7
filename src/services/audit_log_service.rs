//! Consulta de la auditoría de borrados y restauraciones

use std::sync::Arc;

use crate::models::{AuditLogEntry, AuditLogFilter};
use crate::repositories::FleetStore;
use crate::utils::errors::{bad_request_error, AppResult};

pub struct AuditLogService {
    store: Arc<dyn FleetStore>,
}

impl AuditLogService {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    /// Entradas que cumplen el filtro, la más reciente primero
    pub async fn query(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLogEntry>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(bad_request_error("El rango de fechas es inválido: 'from' es posterior a 'to'"));
            }
        }

        let mut tx = self.store.begin_read_only().await?;
        let entries = tx.query_audit_log(filter).await;
        tx.rollback().await?;

        let entries = entries?;
        log::debug!("📜 Auditoría: {} entradas", entries.len());
        Ok(entries)
    }
}
