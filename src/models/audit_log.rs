//! Modelo de AuditLogEntry
//!
//! Registro inmutable de cada borrado lógico y restauración. Nunca se
//! actualiza: deshacer un borrado deja una entrada nueva de restauración.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use super::lifecycle::{EntityKind, RecordRef};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Delete,
    Restore,
}

/// Complejidad de restauración según la cantidad de registros en cascada
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RestoreComplexity {
    Simple,
    Medium,
    Complex,
}

impl RestoreComplexity {
    pub fn from_cascade_count(cascade_count: i64) -> Self {
        match cascade_count {
            c if c <= 0 => RestoreComplexity::Simple,
            c if c < 10 => RestoreComplexity::Medium,
            _ => RestoreComplexity::Complex,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub record_type: EntityKind,
    pub record_id: i64,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub context: serde_json::Value,
    pub cascade_count: i64,
    pub nullify_count: i64,
    pub restored_count: i64,
    pub can_restore: bool,
    pub restore_complexity: Option<RestoreComplexity>,
    pub performed_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.record_type, self.record_id)
    }

    pub fn total_impact(&self) -> i64 {
        self.cascade_count + self.nullify_count
    }

    pub fn is_massive(&self) -> bool {
        self.total_impact() > 10
    }

    pub fn action_description(&self) -> String {
        match self.action {
            AuditAction::Delete => format!("Eliminó {} #{}", self.record_type, self.record_id),
            AuditAction::Restore => format!("Restauró {} #{}", self.record_type, self.record_id),
        }
    }

    pub fn impact_description(&self) -> String {
        let mut parts = Vec::new();
        if self.cascade_count > 0 {
            parts.push(format!("{} en cascada", self.cascade_count));
        }
        if self.nullify_count > 0 {
            parts.push(format!("{} desvinculados", self.nullify_count));
        }

        if parts.is_empty() {
            "Sin impacto adicional".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Datos de una entrada nueva; el id lo asigna el almacén
#[derive(Debug, Clone)]
pub struct NewAuditLogEntry {
    pub record: RecordRef,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub context: serde_json::Value,
    pub cascade_count: i64,
    pub nullify_count: i64,
    pub restored_count: i64,
    pub can_restore: bool,
    pub restore_complexity: Option<RestoreComplexity>,
    pub performed_at: DateTime<Utc>,
}

impl NewAuditLogEntry {
    pub fn into_entry(self, id: Uuid) -> AuditLogEntry {
        AuditLogEntry {
            id,
            record_type: self.record.kind,
            record_id: self.record.id,
            actor_id: self.actor_id,
            action: self.action,
            context: self.context,
            cascade_count: self.cascade_count,
            nullify_count: self.nullify_count,
            restored_count: self.restored_count,
            can_restore: self.can_restore,
            restore_complexity: self.restore_complexity,
            performed_at: self.performed_at,
        }
    }
}

/// Filtros para consultar la auditoría
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogFilter {
    pub record_type: Option<EntityKind>,
    pub record_id: Option<i64>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub actor_id: Option<Uuid>,
    #[serde(default)]
    pub with_cascades: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditLogFilter {
    pub const DEFAULT_LIMIT: i64 = 100;

    pub fn for_record(record: RecordRef) -> Self {
        Self {
            record_type: Some(record.kind),
            record_id: Some(record.id),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.record_type.map_or(true, |t| entry.record_type == t)
            && self.record_id.map_or(true, |id| entry.record_id == id)
            && self.action.map_or(true, |a| entry.action == a)
            && self.from.map_or(true, |from| entry.performed_at >= from)
            && self.to.map_or(true, |to| entry.performed_at <= to)
            && self.actor_id.map_or(true, |actor| entry.actor_id == Some(actor))
            && (!self.with_cascades || entry.cascade_count > 0)
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 1000)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cascade_count: i64, nullify_count: i64) -> AuditLogEntry {
        AuditLogEntry {
            id: Uuid::new_v4(),
            record_type: EntityKind::Vehicle,
            record_id: 4,
            actor_id: None,
            action: AuditAction::Delete,
            context: serde_json::json!({}),
            cascade_count,
            nullify_count,
            restored_count: 0,
            can_restore: true,
            restore_complexity: Some(RestoreComplexity::from_cascade_count(cascade_count)),
            performed_at: Utc::now(),
        }
    }

    #[test]
    fn test_restore_complexity_buckets() {
        assert_eq!(RestoreComplexity::from_cascade_count(0), RestoreComplexity::Simple);
        assert_eq!(RestoreComplexity::from_cascade_count(1), RestoreComplexity::Medium);
        assert_eq!(RestoreComplexity::from_cascade_count(9), RestoreComplexity::Medium);
        assert_eq!(RestoreComplexity::from_cascade_count(10), RestoreComplexity::Complex);
    }

    #[test]
    fn test_impact_description() {
        assert_eq!(entry(0, 0).impact_description(), "Sin impacto adicional");
        assert_eq!(entry(3, 1).impact_description(), "3 en cascada, 1 desvinculados");
        assert!(entry(8, 3).is_massive());
        assert!(!entry(8, 2).is_massive());
    }

    #[test]
    fn test_filter_matching() {
        let e = entry(2, 0);
        assert!(AuditLogFilter::for_record(e.record_ref()).matches(&e));
        let filter = AuditLogFilter {
            action: Some(AuditAction::Restore),
            ..AuditLogFilter::default()
        };
        assert!(!filter.matches(&e));
        let cascades_only = AuditLogFilter {
            with_cascades: true,
            ..AuditLogFilter::default()
        };
        assert!(cascades_only.matches(&e));
        assert!(!cascades_only.matches(&entry(0, 4)));
    }
}
