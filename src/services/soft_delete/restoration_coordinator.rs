//! Coordinador de restauración
//!
//! Fase 1: análisis de restauración y validación de decisiones.
//! Fase 2: una sola transacción con reasignación, cascadas del mismo evento,
//! revalidación de unicidad, hooks y entrada de auditoría.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::errors::{wrap_execution_error, LifecycleError};
use super::options::{ReassignTo, RestorationOptions};
use super::policy::{policy_for, LifecycleContext};
use super::restoration_analyzer::{self, ConflictCategory, RestorationReport, RestoreOption};
use crate::config::ReconciliationConfig;
use crate::models::{
    AuditAction, AuditLogEntry, EntityKind, ForeignKey, LifecycleRecord, NewAuditLogEntry, RecordRef,
};
use crate::repositories::{load_record, FleetStore, FleetTx};
use crate::services::revalidation_service::RevalidationService;
use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct RestorationPreview {
    pub can_proceed: bool,
    pub restoration_info: RestorationReport,
    pub record: LifecycleRecord,
    pub requires_decisions: bool,
    pub restore_options: Vec<RestoreOption>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestorationResult {
    pub record: LifecycleRecord,
    pub restoration_info: RestorationReport,
    pub audit_log: AuditLogEntry,
    pub message: String,
    pub restored_count: i64,
    pub warnings: Vec<String>,
}

pub struct RestorationCoordinator {
    store: Arc<dyn FleetStore>,
    revalidation: RevalidationService,
}

impl RestorationCoordinator {
    pub fn new(store: Arc<dyn FleetStore>, config: &ReconciliationConfig) -> Self {
        Self {
            store,
            revalidation: RevalidationService::new(config),
        }
    }

    pub async fn preview(&self, record: RecordRef) -> AppResult<RestorationPreview> {
        let mut tx = self.store.begin_read_only().await?;
        let analysis = restoration_analyzer::analyze(tx.as_mut(), record).await;
        tx.rollback().await?;

        let report = analysis?;
        Ok(RestorationPreview {
            can_proceed: report.can_restore,
            record: report.record.clone(),
            requires_decisions: !report.cascaded_records.is_empty() || report.parent_conflicts().next().is_some(),
            restore_options: report.restore_options.clone(),
            message: report.recommendation.clone(),
            restoration_info: report,
        })
    }

    pub async fn execute(&self, record: RecordRef, options: RestorationOptions) -> AppResult<RestorationResult> {
        let mut tx = self.store.begin().await?;

        match self.run(tx.as_mut(), record, &options).await {
            Ok(result) => {
                let snapshot = result.restoration_info.clone().into();
                tx.commit()
                    .await
                    .map_err(|e| wrap_execution_error(e, "No se pudo completar la restauración", snapshot))?;
                log::info!("♻️ {}", result.message);
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    log::error!("❌ Error revirtiendo la restauración de {}: {}", record, rollback_error);
                }
                log::warn!("↩️ Restauración de {} revertida: {}", record, e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        tx: &mut dyn FleetTx,
        record: RecordRef,
        options: &RestorationOptions,
    ) -> AppResult<RestorationResult> {
        let report = restoration_analyzer::analyze(tx, record).await?;
        validate_options(&report, options)?;

        self.apply(tx, &report, options)
            .await
            .map_err(|e| wrap_execution_error(e, "No se pudo completar la restauración", report.clone().into()))
    }

    async fn apply(
        &self,
        tx: &mut dyn FleetTx,
        report: &RestorationReport,
        options: &RestorationOptions,
    ) -> AppResult<RestorationResult> {
        let root = report.record.record_ref();
        let context = LifecycleContext {
            actor_id: options.actor_id,
            reassignments: options.reassignment().cloned(),
            ..LifecycleContext::default()
        };

        let company_change = match options.reassignment() {
            Some(reassign) => apply_reassignment(tx, &report.record, reassign).await?,
            None => None,
        };

        let mut restored = Vec::new();
        if options.restores_cascades() {
            for cascade in &report.cascaded_records {
                let selected = options
                    .selected()
                    .map_or(true, |names| names.iter().any(|n| n == &cascade.relation));
                if !selected {
                    continue;
                }
                for id in &cascade.ids {
                    let member = RecordRef::new(cascade.model, *id);
                    tx.set_discarded(member, None, None).await?;
                    restored.push(member);
                }
                log::info!("♻️ Restaurados {} {} de {}", cascade.count, cascade.relation, root);
            }
        }

        if let Some(company_id) = company_change {
            move_children_to_company(tx, &restored, company_id).await?;
        }

        let current = load_record(tx, root)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("{} no existe", root)))?;
        check_uniqueness(tx, &current).await?;

        let policy = policy_for(root.kind);
        let errors = policy.hooks.validate_restore(tx, &current).await?;
        if !errors.is_empty() {
            return Err(LifecycleError::ValidationFailed(errors.join("; ")).into());
        }

        tx.set_discarded(root, None, None).await?;
        restored.push(root);

        for member in &restored {
            let Some(loaded) = load_record(tx, *member).await? else {
                continue;
            };
            policy_for(member.kind)
                .hooks
                .after_restore(tx, &loaded, &context, &self.revalidation)
                .await?;
        }

        let cascaded = restored.len() as i64 - 1;
        let restored_count = restored.len() as i64;
        let at = tx.now();

        let audit_log = tx
            .insert_audit_entry(NewAuditLogEntry {
                record: root,
                actor_id: options.actor_id,
                action: AuditAction::Restore,
                context: json!({
                    "model": root.kind.label(),
                    "record_id": root.id,
                    "restored_at": at,
                    "performed_by": context.actor_id,
                    "reassignments": context.reassignments,
                    "cascades_restored": options.restores_cascades(),
                    "restored_records": restored.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
                }),
                cascade_count: cascaded,
                nullify_count: 0,
                restored_count,
                can_restore: false,
                restore_complexity: None,
                performed_at: at,
            })
            .await?;

        let record = load_record(tx, root)
            .await?
            .unwrap_or_else(|| report.record.clone());

        Ok(RestorationResult {
            message: success_message(root.kind, cascaded, options.reassignment().is_some()),
            warnings: applied_warnings(report, options),
            record,
            restoration_info: report.clone(),
            audit_log,
            restored_count,
        })
    }
}

/// Validaciones de la fase 1
fn validate_options(report: &RestorationReport, options: &RestorationOptions) -> Result<(), LifecycleError> {
    let blockers: Vec<String> = report
        .conflicts
        .iter()
        .filter(|c| c.category != ConflictCategory::ParentDeleted)
        .map(|c| c.message.clone())
        .collect();
    if !blockers.is_empty() {
        return Err(LifecycleError::Blocked {
            message: "La restauración está bloqueada".to_string(),
            errors: blockers,
            analysis: Box::new(report.clone().into()),
        });
    }

    let parent_conflicts: Vec<_> = report.parent_conflicts().collect();
    match options.reassignment() {
        None if !parent_conflicts.is_empty() => {
            return Err(LifecycleError::Blocked {
                message: "La restauración está bloqueada".to_string(),
                errors: parent_conflicts.iter().map(|c| c.message.clone()).collect(),
                analysis: Box::new(report.clone().into()),
            });
        }
        Some(reassign) => {
            let uncovered: Vec<String> = parent_conflicts
                .iter()
                .filter(|c| c.foreign_key.map_or(true, |key| reassign.target_for(key).is_none()))
                .map(|c| match c.foreign_key {
                    Some(key) => format!("reassign_to.{}", key.column()),
                    None => c.message.clone(),
                })
                .collect();
            if !uncovered.is_empty() {
                return Err(LifecycleError::RequiresDecision {
                    message: "Se requieren decisiones adicionales".to_string(),
                    pending: uncovered,
                    analysis: Box::new(report.clone().into()),
                });
            }
        }
        None => {}
    }

    if let Some(selected) = options.selected() {
        let unknown: Vec<String> = selected
            .iter()
            .filter(|name| report.cascade(name).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(LifecycleError::RequiresDecision {
                message: "Faltan decisiones necesarias para restaurar".to_string(),
                pending: unknown,
                analysis: Box::new(report.clone().into()),
            });
        }
    }

    Ok(())
}

/// Aplica `reassign_to` al registro principal. Devuelve la nueva compañía si
/// un vehículo cambió de compañía (sus hijos restaurados deben seguirle).
async fn apply_reassignment(
    tx: &mut dyn FleetTx,
    record: &LifecycleRecord,
    reassign: &ReassignTo,
) -> AppResult<Option<i64>> {
    match record {
        LifecycleRecord::Vehicle(vehicle) => {
            let Some(company_id) = reassign.target_for(ForeignKey::CompanyId) else {
                return Ok(None);
            };
            ensure_kept(tx, RecordRef::new(EntityKind::Company, company_id)).await?;

            let mut updated = vehicle.clone();
            updated.company_id = company_id;
            tx.update_vehicle(&updated).await?;
            log::info!("🔀 Vehículo {} reasignado a la compañía {}", vehicle.id, company_id);

            Ok((vehicle.company_id != company_id).then_some(company_id))
        }
        LifecycleRecord::MileageReading(reading) => {
            let Some(vehicle_id) = reassign.target_for(ForeignKey::VehicleId) else {
                return Ok(None);
            };
            let vehicle = ensure_kept_vehicle(tx, vehicle_id).await?;

            let mut updated = reading.clone();
            updated.vehicle_id = vehicle.id;
            updated.company_id = vehicle.company_id;
            tx.update_reading(&updated).await?;
            log::info!("🔀 Registro de km {} reasignado al vehículo {}", reading.id, vehicle.id);
            Ok(None)
        }
        LifecycleRecord::MaintenanceEvent(maintenance) => {
            let Some(vehicle_id) = reassign.target_for(ForeignKey::VehicleId) else {
                return Ok(None);
            };
            let vehicle = ensure_kept_vehicle(tx, vehicle_id).await?;

            let mut updated = maintenance.clone();
            updated.vehicle_id = vehicle.id;
            updated.company_id = vehicle.company_id;
            tx.update_maintenance(&updated).await?;
            log::info!("🔀 Mantenimiento {} reasignado al vehículo {}", maintenance.id, vehicle.id);
            Ok(None)
        }
        LifecycleRecord::Company(_) => Ok(None),
    }
}

async fn ensure_kept(tx: &mut dyn FleetTx, target: RecordRef) -> AppResult<LifecycleRecord> {
    load_record(tx, target)
        .await?
        .filter(|r| r.is_kept())
        .ok_or_else(|| {
            AppError::from(LifecycleError::ValidationFailed(format!(
                "El destino de la reasignación {} no existe o está eliminado",
                target
            )))
        })
}

async fn ensure_kept_vehicle(tx: &mut dyn FleetTx, vehicle_id: i64) -> AppResult<crate::models::Vehicle> {
    match ensure_kept(tx, RecordRef::new(EntityKind::Vehicle, vehicle_id)).await? {
        LifecycleRecord::Vehicle(vehicle) => Ok(vehicle),
        other => Err(AppError::Internal(format!("Se esperaba un vehículo, llegó {}", other.record_ref()))),
    }
}

/// Alinea `company_id` de los hijos restaurados con la nueva compañía del vehículo
async fn move_children_to_company(tx: &mut dyn FleetTx, restored: &[RecordRef], company_id: i64) -> AppResult<()> {
    for member in restored {
        match member.kind {
            EntityKind::MileageReading => {
                if let Some(mut reading) = tx.find_reading(member.id).await? {
                    reading.company_id = company_id;
                    tx.update_reading(&reading).await?;
                }
            }
            EntityKind::MaintenanceEvent => {
                if let Some(mut maintenance) = tx.find_maintenance(member.id).await? {
                    maintenance.company_id = company_id;
                    tx.update_maintenance(&maintenance).await?;
                }
            }
            EntityKind::Company | EntityKind::Vehicle => {}
        }
    }
    Ok(())
}

/// Revalida la unicidad después de reasignar (el ámbito pudo cambiar)
async fn check_uniqueness(tx: &mut dyn FleetTx, record: &LifecycleRecord) -> AppResult<()> {
    for constraint in policy_for(record.kind()).uniqueness_constraints {
        let Some(value) = record.unique_value(constraint.field) else {
            continue;
        };
        let scope = constraint
            .scope
            .and_then(|key| record.foreign_key(key).map(|id| (key, id)));

        if let Some(existing) = tx
            .find_unique_collision(record.kind(), constraint.field, value, scope, record.id())
            .await?
        {
            return Err(LifecycleError::ValidationFailed(format!(
                "Ya existe un registro activo con {}: '{}' (ID: {})",
                constraint.field.label(),
                value,
                existing
            ))
            .into());
        }
    }
    Ok(())
}

fn applied_warnings(report: &RestorationReport, options: &RestorationOptions) -> Vec<String> {
    let mut warnings = Vec::new();

    if !report.cascaded_records.is_empty() && !options.restores_cascades() {
        warnings.push(format!(
            "{} registros relacionados NO fueron restaurados",
            report.cascaded_total()
        ));
    }

    if let Some(selected) = options.selected() {
        let skipped: Vec<&str> = report
            .cascaded_records
            .iter()
            .map(|c| c.relation.as_str())
            .filter(|relation| !selected.iter().any(|s| s == relation))
            .collect();
        if !skipped.is_empty() {
            warnings.push(format!(
                "Algunas cascadas NO fueron restauradas: {}",
                skipped.join(", ")
            ));
        }
    }

    warnings
}

fn success_message(kind: EntityKind, cascaded: i64, reassigned: bool) -> String {
    let mut parts = vec![format!("{} restaurado correctamente", kind)];
    if cascaded > 0 {
        parts.push(format!("{} registros restaurados en cascada", cascaded));
    }
    if reassigned {
        parts.push("con reasignación de relaciones padre".to_string());
    }
    parts.join(". ")
}
