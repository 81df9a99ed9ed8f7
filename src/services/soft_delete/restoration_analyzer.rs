//! Análisis de restauración de un registro descartado
//!
//! Busca conflictos (unicidad, padre eliminado, validaciones del modelo),
//! cuenta lo que se borró en cascada en el mismo evento y ordena las opciones
//! de restauración posibles.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::LifecycleError;
use super::impact_analyzer::EstimatedTime;
use super::policy::policy_for;
use super::relations::{cascade_ids, load_parent};
use crate::models::{
    AuditAction, AuditLogEntry, AuditLogFilter, EntityKind, ForeignKey, LifecycleRecord, RecordRef,
    RecordScope, RestoreComplexity, Severity,
};
use crate::repositories::{load_record, FleetTx};
use crate::utils::errors::AppResult;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    Uniqueness,
    ParentDeleted,
    Validation,
}

/// Conflicto que impide restaurar (todos son bloqueantes)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RestorationConflict {
    pub category: ConflictCategory,
    pub message: String,
    pub severity: Severity,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_record: Option<RecordRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    /// Clave a reasignar para resolver un conflicto de padre
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

impl RestorationConflict {
    fn blocker(category: ConflictCategory, message: String, severity: Severity, suggestion: String) -> Self {
        Self {
            category,
            message,
            severity,
            suggestion,
            field: None,
            value: None,
            existing_record: None,
            parent: None,
            parent_name: None,
            foreign_key: None,
        }
    }
}

/// Registros de una relación descartados en el mismo evento que el principal
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CascadedRecords {
    pub relation: String,
    pub model: EntityKind,
    pub count: usize,
    pub ids: Vec<i64>,
    pub can_restore_cascade: bool,
    pub deleted_at: DateTime<Utc>,
    pub recommendation: String,
    pub complexity: RestoreComplexity,
    pub estimated_time: EstimatedTime,
}

impl CascadedRecords {
    pub fn new(relation: &str, model: EntityKind, ids: Vec<i64>, deleted_at: DateTime<Utc>) -> Self {
        let count = ids.len();
        Self {
            relation: relation.to_string(),
            model,
            count,
            ids,
            can_restore_cascade: true,
            deleted_at,
            recommendation: cascade_recommendation(count),
            complexity: RestoreComplexity::from_cascade_count(count as i64),
            estimated_time: EstimatedTime::from_count(count),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestoreOptionKind {
    Simple,
    Cascade,
    Merge,
    Reassign,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RestoreOption {
    #[serde(rename = "type")]
    pub kind: RestoreOptionKind,
    pub name: String,
    pub description: String,
    pub will_restore_count: usize,
    pub leaves_orphaned: bool,
    pub recommended: bool,
    pub requires_manual_action: bool,
    pub complexity: RestoreComplexity,
    pub estimated_time: EstimatedTime,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RestorationReport {
    pub record: LifecycleRecord,
    pub can_restore: bool,
    pub conflicts: Vec<RestorationConflict>,
    pub cascaded_records: Vec<CascadedRecords>,
    pub restore_options: Vec<RestoreOption>,
    pub estimated_time: EstimatedTime,
    pub recommendation: String,
    pub deletion_log: Option<AuditLogEntry>,
}

impl RestorationReport {
    pub fn cascaded_total(&self) -> usize {
        self.cascaded_records.iter().map(|c| c.count).sum()
    }

    pub fn parent_conflicts(&self) -> impl Iterator<Item = &RestorationConflict> {
        self.conflicts
            .iter()
            .filter(|c| c.category == ConflictCategory::ParentDeleted)
    }

    pub fn cascade(&self, relation: &str) -> Option<&CascadedRecords> {
        self.cascaded_records.iter().find(|c| c.relation == relation)
    }
}

/// Analiza la restauración de `record`, que debe estar descartado
pub async fn analyze(tx: &mut dyn FleetTx, record: RecordRef) -> AppResult<RestorationReport> {
    let loaded = load_record(tx, record)
        .await?
        .filter(|r| !r.is_kept())
        .ok_or_else(|| LifecycleError::NotFound(format!("{} no existe o no está eliminado", record)))?;

    let policy = policy_for(loaded.kind());
    let mut conflicts = Vec::new();

    for constraint in policy.uniqueness_constraints {
        let Some(value) = loaded.unique_value(constraint.field) else {
            continue;
        };
        let scope = constraint
            .scope
            .and_then(|key| loaded.foreign_key(key).map(|id| (key, id)));
        let Some(existing_id) = tx
            .find_unique_collision(loaded.kind(), constraint.field, value, scope, loaded.id())
            .await?
        else {
            continue;
        };

        let existing = RecordRef::new(loaded.kind(), existing_id);
        let field = constraint.field.label();
        let mut conflict = RestorationConflict::blocker(
            ConflictCategory::Uniqueness,
            format!("Ya existe un registro activo con {}: '{}' ({})", field, value, existing),
            Severity::Critical,
            format!(
                "Debe cambiar el {} del registro existente o fusionar ambos registros",
                field
            ),
        );
        conflict.field = Some(field.to_string());
        conflict.value = Some(value.to_string());
        conflict.existing_record = Some(existing);
        conflicts.push(conflict);
    }

    for relation in policy.parent_relations {
        let Some(parent) = load_parent(tx, &loaded, relation).await? else {
            continue;
        };
        if parent.is_kept() {
            continue;
        }

        let (message, suggestion) = parent_conflict_text(&parent);
        let mut conflict =
            RestorationConflict::blocker(ConflictCategory::ParentDeleted, message, Severity::Critical, suggestion);
        conflict.parent = Some(parent.record_ref());
        conflict.parent_name = Some(parent.display_name());
        conflict.foreign_key = Some(relation.key);
        conflicts.push(conflict);
    }

    for message in policy.hooks.validate_restore(tx, &loaded).await? {
        conflicts.push(RestorationConflict::blocker(
            ConflictCategory::Validation,
            message,
            Severity::High,
            "Resuelva este problema antes de restaurar".to_string(),
        ));
    }

    let deletion_log = latest_deletion_log(tx, record).await?;
    let mut cascaded_records = Vec::new();

    if let Some(log) = deletion_log.as_ref().filter(|log| log.cascade_count > 0) {
        for relation in policy.cascade_relations {
            let ids = cascade_ids(tx, relation, loaded.id(), RecordScope::DiscardedAt(log.performed_at)).await?;
            if ids.is_empty() {
                continue;
            }
            cascaded_records.push(CascadedRecords::new(relation.name, relation.target, ids, log.performed_at));
        }
    }

    Ok(assemble_restoration(loaded, conflicts, cascaded_records, deletion_log))
}

/// Última entrada de borrado del registro
pub async fn latest_deletion_log(tx: &mut dyn FleetTx, record: RecordRef) -> AppResult<Option<AuditLogEntry>> {
    let filter = AuditLogFilter {
        action: Some(AuditAction::Delete),
        limit: Some(1),
        ..AuditLogFilter::for_record(record)
    };
    Ok(tx.query_audit_log(&filter).await?.into_iter().next())
}

fn parent_conflict_text(parent: &LifecycleRecord) -> (String, String) {
    match parent.kind() {
        EntityKind::Company => (
            format!(
                "La compañía asociada '{}' (ID: {}) fue eliminada",
                parent.display_name(),
                parent.id()
            ),
            "Debe restaurar primero la compañía o reasignar el vehículo a otra compañía".to_string(),
        ),
        EntityKind::Vehicle => (
            format!(
                "El vehículo asociado '{}' (ID: {}) fue eliminado",
                parent.display_name(),
                parent.id()
            ),
            "Debe restaurar primero el vehículo".to_string(),
        ),
        other => (
            format!("El registro padre {} #{} fue eliminado", other, parent.id()),
            "Debe restaurar primero el registro padre".to_string(),
        ),
    }
}

fn cascade_recommendation(count: usize) -> String {
    if count <= 10 {
        format!("Recomendado: restaurar en cascada ({} registros)", count)
    } else if count <= 100 {
        format!("Opcional: restaurar en cascada ({} registros, puede tardar)", count)
    } else {
        format!("Precaución: restaurar en cascada ({} registros, operación pesada)", count)
    }
}

/// Arma el informe: opciones, estimación y recomendación
pub fn assemble_restoration(
    record: LifecycleRecord,
    conflicts: Vec<RestorationConflict>,
    cascaded_records: Vec<CascadedRecords>,
    deletion_log: Option<AuditLogEntry>,
) -> RestorationReport {
    let cascaded_total: usize = cascaded_records.iter().map(|c| c.count).sum();
    let restore_options = restore_options(&conflicts, cascaded_total);
    let recommendation = recommendation(&conflicts, cascaded_total);

    RestorationReport {
        record,
        can_restore: conflicts.is_empty(),
        conflicts,
        cascaded_records,
        restore_options,
        estimated_time: EstimatedTime::from_count(cascaded_total),
        recommendation,
        deletion_log,
    }
}

fn restore_options(conflicts: &[RestorationConflict], cascaded_total: usize) -> Vec<RestoreOption> {
    let mut options = vec![RestoreOption {
        kind: RestoreOptionKind::Simple,
        name: "Restauración simple".to_string(),
        description: "Restaurar solo este registro".to_string(),
        will_restore_count: 1,
        leaves_orphaned: cascaded_total > 0,
        recommended: cascaded_total == 0,
        requires_manual_action: false,
        complexity: RestoreComplexity::Simple,
        estimated_time: EstimatedTime::Instant,
        warnings: if cascaded_total > 0 {
            vec![format!(
                "Dejará {} registros relacionados sin restaurar",
                cascaded_total
            )]
        } else {
            Vec::new()
        },
    }];

    if cascaded_total > 0 {
        options.push(RestoreOption {
            kind: RestoreOptionKind::Cascade,
            name: "Restauración en cascada".to_string(),
            description: format!(
                "Restaurar este registro y {} registros relacionados",
                cascaded_total
            ),
            will_restore_count: 1 + cascaded_total,
            leaves_orphaned: false,
            recommended: true,
            requires_manual_action: false,
            complexity: RestoreComplexity::from_cascade_count(cascaded_total as i64),
            estimated_time: EstimatedTime::from_count(cascaded_total),
            warnings: if cascaded_total > 100 {
                vec!["Esta operación puede tardar varios minutos".to_string()]
            } else {
                Vec::new()
            },
        });
    }

    if conflicts.iter().any(|c| c.category == ConflictCategory::Uniqueness) {
        options.push(RestoreOption {
            kind: RestoreOptionKind::Merge,
            name: "Fusión con registro existente".to_string(),
            description: "Fusionar datos con el registro activo que tiene los mismos valores únicos".to_string(),
            will_restore_count: 0,
            leaves_orphaned: false,
            recommended: false,
            requires_manual_action: true,
            complexity: RestoreComplexity::Complex,
            estimated_time: EstimatedTime::Manual,
            warnings: vec!["Requiere intervención manual para decidir qué datos conservar".to_string()],
        });
    }

    if conflicts.iter().any(|c| c.category == ConflictCategory::ParentDeleted) {
        options.push(RestoreOption {
            kind: RestoreOptionKind::Reassign,
            name: "Restauración con reasignación".to_string(),
            description: "Restaurar el registro asignándolo a otra relación padre activa".to_string(),
            will_restore_count: 1,
            leaves_orphaned: false,
            recommended: false,
            requires_manual_action: true,
            complexity: RestoreComplexity::Medium,
            estimated_time: EstimatedTime::Manual,
            warnings: vec!["Debe seleccionar manualmente el nuevo padre antes de restaurar".to_string()],
        });
    }

    options
}

fn recommendation(conflicts: &[RestorationConflict], cascaded_total: usize) -> String {
    if let Some(parent) = conflicts
        .iter()
        .find(|c| c.category == ConflictCategory::ParentDeleted)
        .and_then(|c| c.parent)
    {
        return format!("BLOQUEADO: Debe restaurar primero {} #{}", parent.kind, parent.id);
    }

    if conflicts.iter().any(|c| c.category == ConflictCategory::Uniqueness) {
        return "CONFLICTO: Ya existe un registro activo con los mismos datos únicos. \
                Debe cambiar el registro existente o fusionar ambos."
            .to_string();
    }

    if let Some(validation) = conflicts.iter().find(|c| c.category == ConflictCategory::Validation) {
        return format!("PRECAUCIÓN: {}", validation.message);
    }

    if cascaded_total > 100 {
        return format!(
            "RECOMENDADO: Restaurar en cascada con precaución ({} registros relacionados)",
            cascaded_total
        );
    }
    if cascaded_total > 0 {
        return format!("SUGERIDO: Restaurar en cascada ({} registros relacionados)", cascaded_total);
    }

    "OK: Seguro para restaurar".to_string()
}
