//! Coordinador de borrado lógico
//!
//! Fase 1: análisis de impacto y validación de opciones (sin mutación).
//! Fase 2: una sola transacción con hooks, cascadas, desvinculaciones,
//! revalidación de km y entrada de auditoría. Cualquier fallo revierte todo.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::errors::{wrap_execution_error, AnalysisSnapshot, LifecycleError};
use super::impact_analyzer::{self, CascadeImpact, ImpactReport};
use super::options::DeletionOptions;
use super::policy::{policy_for, LifecycleContext};
use super::relations::{deletion_set, nullify_references};
use crate::config::ReconciliationConfig;
use crate::models::{AuditAction, AuditLogEntry, LifecycleRecord, NewAuditLogEntry, RecordRef, RestoreComplexity};
use crate::repositories::{load_record, FleetStore, FleetTx};
use crate::services::revalidation_service::RevalidationService;
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct DeletionPreview {
    pub can_proceed: bool,
    pub impact: ImpactReport,
    pub record: LifecycleRecord,
    pub requires_force: bool,
    pub optional_cascades: Vec<CascadeImpact>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionResult {
    pub record: LifecycleRecord,
    pub impact: ImpactReport,
    pub audit_log: AuditLogEntry,
    pub message: String,
    /// Advertencias aceptadas con `force`
    pub warnings: Vec<String>,
    pub cascade_count: i64,
    pub nullify_count: i64,
}

pub struct DeletionCoordinator {
    store: Arc<dyn FleetStore>,
    revalidation: RevalidationService,
}

impl DeletionCoordinator {
    pub fn new(store: Arc<dyn FleetStore>, config: &ReconciliationConfig) -> Self {
        Self {
            store,
            revalidation: RevalidationService::new(config),
        }
    }

    /// Solo el análisis, sin efectos
    pub async fn preview(&self, record: RecordRef) -> AppResult<DeletionPreview> {
        let mut tx = self.store.begin_read_only().await?;
        let analysis = analyze_kept(tx.as_mut(), record).await;
        tx.rollback().await?;

        let impact = analysis?;
        Ok(DeletionPreview {
            can_proceed: impact.can_delete,
            record: impact.record.clone(),
            requires_force: impact.requires_force(),
            optional_cascades: impact.optional_cascades(),
            message: impact.recommendation.clone(),
            impact,
        })
    }

    pub async fn execute(&self, record: RecordRef, options: DeletionOptions) -> AppResult<DeletionResult> {
        let mut tx = self.store.begin().await?;

        match self.run(tx.as_mut(), record, &options).await {
            Ok(result) => {
                let snapshot = AnalysisSnapshot::Impact(result.impact.clone());
                tx.commit()
                    .await
                    .map_err(|e| wrap_execution_error(e, "No se pudo completar el borrado", snapshot))?;
                log::info!("🗑️ {}", result.message);
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    log::error!("❌ Error revirtiendo el borrado de {}: {}", record, rollback_error);
                }
                log::warn!("↩️ Borrado de {} revertido: {}", record, e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        tx: &mut dyn FleetTx,
        record: RecordRef,
        options: &DeletionOptions,
    ) -> AppResult<DeletionResult> {
        let loaded = load_kept(tx, record).await?;
        let impact = impact_analyzer::analyze(tx, &loaded).await?;
        validate_options(&impact, options)?;

        self.apply(tx, &loaded, &impact, options)
            .await
            .map_err(|e| wrap_execution_error(e, "No se pudo completar el borrado", impact.clone().into()))
    }

    async fn apply(
        &self,
        tx: &mut dyn FleetTx,
        root: &LifecycleRecord,
        impact: &ImpactReport,
        options: &DeletionOptions,
    ) -> AppResult<DeletionResult> {
        let mut context = LifecycleContext {
            actor_id: options.actor_id,
            cascade_decisions: options.cascade_options.clone(),
            ..LifecycleContext::default()
        };

        let policy = policy_for(root.kind());
        policy.hooks.before_delete(tx, root, &mut context).await?;

        let members = deletion_set(tx, root, options).await?;
        let at = tx.now();
        for member in &members {
            tx.set_discarded(*member, Some(at), options.actor_id).await?;
        }

        let mut nullify_count: u64 = 0;
        for member in &members {
            nullify_count += nullify_references(tx, *member).await?;
        }

        for member in &members {
            let Some(deleted) = load_record(tx, *member).await? else {
                continue;
            };
            policy_for(member.kind)
                .hooks
                .after_delete(tx, &deleted, &context, &self.revalidation)
                .await?;
        }

        let cascade_count = members.len().saturating_sub(1) as i64;
        let nullify_count = nullify_count as i64;
        let cascaded: Vec<String> = members
            .iter()
            .filter(|m| **m != root.record_ref())
            .map(|m| m.to_string())
            .collect();

        let audit_log = tx
            .insert_audit_entry(NewAuditLogEntry {
                record: root.record_ref(),
                actor_id: options.actor_id,
                action: AuditAction::Delete,
                context: json!({
                    "model": root.kind().label(),
                    "record_id": root.id(),
                    "deleted_at": at,
                    "cascade_count": cascade_count,
                    "nullify_count": nullify_count,
                    "performed_by": context.actor_id,
                    "cascade_decisions": context.cascade_decisions,
                    "cascaded_records": cascaded,
                    "notes": context.notes,
                }),
                cascade_count,
                nullify_count,
                restored_count: 0,
                can_restore: true,
                restore_complexity: Some(RestoreComplexity::from_cascade_count(cascade_count)),
                performed_at: at,
            })
            .await?;

        let record = load_record(tx, root.record_ref())
            .await?
            .unwrap_or_else(|| root.clone());

        Ok(DeletionResult {
            message: success_message(root, cascade_count, nullify_count),
            warnings: if options.force {
                impact.warning_messages()
            } else {
                Vec::new()
            },
            record,
            impact: impact.clone(),
            audit_log,
            cascade_count,
            nullify_count,
        })
    }
}

async fn load_kept(tx: &mut dyn FleetTx, record: RecordRef) -> AppResult<LifecycleRecord> {
    load_record(tx, record)
        .await?
        .filter(|r| r.is_kept())
        .ok_or_else(|| AppError::from(LifecycleError::NotFound(format!("{} no existe o ya está eliminado", record))))
}

async fn analyze_kept(tx: &mut dyn FleetTx, record: RecordRef) -> AppResult<ImpactReport> {
    let loaded = load_kept(tx, record).await?;
    impact_analyzer::analyze(tx, &loaded).await
}

/// Validaciones de la fase 1 sobre el análisis ya calculado
fn validate_options(impact: &ImpactReport, options: &DeletionOptions) -> Result<(), LifecycleError> {
    if !impact.blockers.is_empty() {
        return Err(LifecycleError::Blocked {
            message: "El borrado está bloqueado".to_string(),
            errors: impact.blocker_messages(),
            analysis: Box::new(impact.clone().into()),
        });
    }

    if impact.requires_force() && !options.force {
        return Err(LifecycleError::RequiresConfirmation {
            message: "El borrado requiere confirmación (use force: true)".to_string(),
            warnings: impact.warning_messages(),
            analysis: Box::new(impact.clone().into()),
        });
    }

    let pending: Vec<String> = impact
        .optional_cascades()
        .into_iter()
        .filter(|c| options.decision_for(&c.relation).is_none())
        .map(|c| c.relation)
        .collect();
    if !pending.is_empty() {
        return Err(LifecycleError::RequiresDecision {
            message: "Faltan decisiones sobre cascadas opcionales".to_string(),
            pending,
            analysis: Box::new(impact.clone().into()),
        });
    }

    Ok(())
}

fn success_message(root: &LifecycleRecord, cascade_count: i64, nullify_count: i64) -> String {
    let mut parts = vec![format!("{} eliminado correctamente", root.kind())];
    if cascade_count > 0 {
        parts.push(format!("{} registros eliminados en cascada", cascade_count));
    }
    if nullify_count > 0 {
        parts.push(format!("{} registros desvinculados", nullify_count));
    }
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityKind, MaintenanceEvent, Severity};
    use crate::services::soft_delete::impact_analyzer::{assemble_impact, ImpactWarning, WarningKind};
    use crate::services::soft_delete::options::CascadeDecision;
    use chrono::{NaiveDate, Utc};

    fn maintenance() -> LifecycleRecord {
        LifecycleRecord::MaintenanceEvent(MaintenanceEvent {
            id: 8,
            vehicle_id: 2,
            company_id: 1,
            maintenance_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            register_km: 42000,
            amount: None,
            description: None,
            reading_id: Some(30),
            discarded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn optional_cascade() -> CascadeImpact {
        CascadeImpact {
            relation: "vehicle_km".to_string(),
            model: EntityKind::MileageReading,
            count: 1,
            optional: true,
            action: "Opcional: puede borrar o mantener".to_string(),
        }
    }

    #[test]
    fn test_forceable_warning_requires_confirmation() {
        let warning = ImpactWarning {
            kind: WarningKind::ModelSpecific,
            message: "Este mantenimiento tiene un costo alto (1500€).".to_string(),
            severity: Severity::Medium,
            can_force: true,
        };
        let impact = assemble_impact(maintenance(), vec![], vec![], vec![], vec![], vec![warning]);

        let err = validate_options(&impact, &DeletionOptions::default()).unwrap_err();
        assert_eq!(err.code(), "REQUIRES_CONFIRMATION");

        let forced = DeletionOptions {
            force: true,
            ..DeletionOptions::default()
        };
        assert!(validate_options(&impact, &forced).is_ok());
    }

    #[test]
    fn test_optional_cascade_requires_decision() {
        let impact = assemble_impact(maintenance(), vec![], vec![optional_cascade()], vec![], vec![], vec![]);

        match validate_options(&impact, &DeletionOptions::default()) {
            Err(LifecycleError::RequiresDecision { pending, .. }) => assert_eq!(pending, vec!["vehicle_km"]),
            other => panic!("se esperaba RequiresDecision, llegó {:?}", other),
        }

        let mut options = DeletionOptions::default();
        options
            .cascade_options
            .insert("vehicle_km".to_string(), CascadeDecision::Keep);
        assert!(validate_options(&impact, &options).is_ok());
    }

    #[test]
    fn test_success_message() {
        assert_eq!(
            success_message(&maintenance(), 0, 1),
            "MaintenanceEvent eliminado correctamente. 1 registros desvinculados"
        );
    }
}
