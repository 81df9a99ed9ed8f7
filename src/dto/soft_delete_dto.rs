use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{AuditAction, AuditLogEntry, EntityKind, RestoreComplexity};

// Entrada de auditoría con sus descripciones legibles
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub record_type: EntityKind,
    pub record_id: i64,
    pub action: AuditAction,
    pub actor_id: Option<Uuid>,
    pub performed_at: DateTime<Utc>,
    pub cascade_count: i64,
    pub nullify_count: i64,
    pub restored_count: i64,
    pub restore_complexity: Option<RestoreComplexity>,
    pub is_massive: bool,
    pub action_description: String,
    pub impact_description: String,
    pub context: serde_json::Value,
}

impl From<AuditLogEntry> for AuditLogResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            is_massive: entry.is_massive(),
            action_description: entry.action_description(),
            impact_description: entry.impact_description(),
            id: entry.id,
            record_type: entry.record_type,
            record_id: entry.record_id,
            action: entry.action,
            actor_id: entry.actor_id,
            performed_at: entry.performed_at,
            cascade_count: entry.cascade_count,
            nullify_count: entry.nullify_count,
            restored_count: entry.restored_count,
            restore_complexity: entry.restore_complexity,
            context: entry.context,
        }
    }
}
