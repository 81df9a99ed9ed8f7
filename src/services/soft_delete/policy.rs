//! Políticas de ciclo de vida por tipo de entidad
//!
//! Cada tipo declara sus cascadas, bloqueos, relaciones a desvincular,
//! restricciones de unicidad, padres y hooks. Los coordinadores solo consultan
//! esta tabla estática; no hay lógica de borrado dentro de los modelos.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::impact_analyzer::{ImpactWarning, WarningKind};
use super::options::{CascadeDecision, ReassignTo};
use crate::models::{
    EntityKind, ForeignKey, LifecycleRecord, ReadingStatus, RecordScope, Severity, UniqueField,
};
use crate::repositories::FleetTx;
use crate::services::revalidation_service::RevalidationService;
use crate::utils::errors::AppResult;

/// Hijos que se borran junto al registro
#[derive(Debug, Clone, Copy)]
pub struct CascadeRelation {
    pub name: &'static str,
    pub target: EntityKind,
    pub key: ForeignKey,
    /// Requiere decisión explícita (`delete` / `keep`) del cliente
    pub optional: bool,
    /// Solo aplica si el predicado se cumple sobre el registro padre
    pub condition: Option<fn(&LifecycleRecord) -> bool>,
}

impl CascadeRelation {
    pub fn applies_to(&self, record: &LifecycleRecord) -> bool {
        self.condition.map_or(true, |condition| condition(record))
    }
}

/// Relación que impide el borrado mientras tenga registros vigentes
#[derive(Debug, Clone, Copy)]
pub struct BlockingRelation {
    pub name: &'static str,
    pub target: EntityKind,
    pub key: ForeignKey,
    pub message: &'static str,
}

/// Registros vigentes cuya clave se pone a NULL al borrar
#[derive(Debug, Clone, Copy)]
pub struct NullifyRelation {
    pub name: &'static str,
    pub target: EntityKind,
    pub key: ForeignKey,
    pub notify: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct UniquenessConstraint {
    pub field: UniqueField,
    pub scope: Option<ForeignKey>,
}

/// Padre inmediato; si está descartado el registro no se puede restaurar tal cual
#[derive(Debug, Clone, Copy)]
pub struct ParentRelation {
    pub name: &'static str,
    pub kind: EntityKind,
    pub key: ForeignKey,
}

pub struct EntityPolicy {
    pub kind: EntityKind,
    pub cascade_relations: &'static [CascadeRelation],
    pub blocking_relations: &'static [BlockingRelation],
    pub nullify_relations: &'static [NullifyRelation],
    pub uniqueness_constraints: &'static [UniquenessConstraint],
    pub parent_relations: &'static [ParentRelation],
    pub hooks: &'static dyn LifecycleHooks,
}

impl EntityPolicy {
    pub fn cascade(&self, name: &str) -> Option<&'static CascadeRelation> {
        self.cascade_relations.iter().find(|r| r.name == name)
    }
}

/// Resultado de una validación previa al borrado
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyValidation {
    Blocker(String),
    Warning {
        message: String,
        severity: Severity,
        can_force: bool,
    },
}

/// Contexto explícito que viaja entre los hooks de una misma operación
#[derive(Debug, Clone, Default, Serialize)]
pub struct LifecycleContext {
    pub actor_id: Option<Uuid>,
    pub cascade_decisions: BTreeMap<String, CascadeDecision>,
    pub reassignments: Option<ReassignTo>,
    pub notes: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn deletion_validations(
        &self,
        _tx: &mut dyn FleetTx,
        _record: &LifecycleRecord,
    ) -> AppResult<Vec<PolicyValidation>> {
        Ok(Vec::new())
    }

    /// Advertencias propias del modelo; `cascade_total` es lo que se borrará en cascada
    async fn model_warnings(
        &self,
        _tx: &mut dyn FleetTx,
        _record: &LifecycleRecord,
        _cascade_total: usize,
    ) -> AppResult<Vec<ImpactWarning>> {
        Ok(Vec::new())
    }

    async fn before_delete(
        &self,
        _tx: &mut dyn FleetTx,
        _record: &LifecycleRecord,
        _context: &mut LifecycleContext,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn after_delete(
        &self,
        _tx: &mut dyn FleetTx,
        _record: &LifecycleRecord,
        _context: &LifecycleContext,
        _revalidation: &RevalidationService,
    ) -> AppResult<()> {
        Ok(())
    }

    /// Mensajes que bloquean la restauración
    async fn validate_restore(&self, _tx: &mut dyn FleetTx, _record: &LifecycleRecord) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn after_restore(
        &self,
        _tx: &mut dyn FleetTx,
        _record: &LifecycleRecord,
        _context: &LifecycleContext,
        _revalidation: &RevalidationService,
    ) -> AppResult<()> {
        Ok(())
    }
}

fn model_warning(message: String, severity: Severity) -> ImpactWarning {
    ImpactWarning {
        kind: WarningKind::ModelSpecific,
        message,
        severity,
        can_force: true,
    }
}

struct CompanyHooks;

#[async_trait]
impl LifecycleHooks for CompanyHooks {
    async fn model_warnings(
        &self,
        _tx: &mut dyn FleetTx,
        _record: &LifecycleRecord,
        cascade_total: usize,
    ) -> AppResult<Vec<ImpactWarning>> {
        let mut warnings = Vec::new();
        if cascade_total > 500 {
            warnings.push(model_warning(
                format!(
                    "Esta compañía tiene {} registros asociados. La operación puede tardar varios minutos.",
                    cascade_total
                ),
                Severity::High,
            ));
        }
        Ok(warnings)
    }
}

struct VehicleHooks;

#[async_trait]
impl LifecycleHooks for VehicleHooks {
    async fn model_warnings(
        &self,
        tx: &mut dyn FleetTx,
        record: &LifecycleRecord,
        _cascade_total: usize,
    ) -> AppResult<Vec<ImpactWarning>> {
        let km_count = tx
            .related_ids(EntityKind::MileageReading, ForeignKey::VehicleId, record.id(), RecordScope::Kept)
            .await?
            .len();

        let mut warnings = Vec::new();
        if km_count > 100 {
            warnings.push(model_warning(
                format!("Este vehículo tiene {} registros de KM que se borrarán.", km_count),
                Severity::High,
            ));
        }
        Ok(warnings)
    }
}

struct MileageReadingHooks;

impl MileageReadingHooks {
    /// Revalida la ventana del registro si su vehículo sigue vigente
    async fn revalidate_neighbors(
        tx: &mut dyn FleetTx,
        record: &LifecycleRecord,
        revalidation: &RevalidationService,
    ) -> AppResult<()> {
        let Some(reading) = record.as_reading() else {
            return Ok(());
        };
        let vehicle_kept = tx.find_vehicle(reading.vehicle_id).await?.map_or(false, |v| v.is_kept());
        if !vehicle_kept {
            return Ok(());
        }

        // El estado actual (descartado o restaurado) decide si entra en la ventana
        let current = tx.find_reading(reading.id).await?.unwrap_or_else(|| reading.clone());
        let outcome = revalidation.revalidate(tx, &current, None).await?;
        revalidation.refresh_vehicle_mileage(tx, reading.vehicle_id).await;

        log::info!(
            "🔄 Ventana del registro {} revalidada: {} cambios",
            reading.id,
            outcome.changed_count()
        );
        Ok(())
    }
}

#[async_trait]
impl LifecycleHooks for MileageReadingHooks {
    async fn model_warnings(
        &self,
        _tx: &mut dyn FleetTx,
        record: &LifecycleRecord,
        _cascade_total: usize,
    ) -> AppResult<Vec<ImpactWarning>> {
        let mut warnings = Vec::new();
        if let Some(reading) = record.as_reading() {
            if reading.from_maintenance() {
                warnings.push(model_warning(
                    "Este registro fue creado desde un mantenimiento. El mantenimiento quedará desvinculado."
                        .to_string(),
                    Severity::Medium,
                ));
            }
            if reading.status == ReadingStatus::Corrected {
                warnings.push(model_warning(
                    "Este KM tiene correcciones automáticas que se perderán.".to_string(),
                    Severity::Medium,
                ));
            }
        }
        Ok(warnings)
    }

    async fn after_delete(
        &self,
        tx: &mut dyn FleetTx,
        record: &LifecycleRecord,
        _context: &LifecycleContext,
        revalidation: &RevalidationService,
    ) -> AppResult<()> {
        Self::revalidate_neighbors(tx, record, revalidation).await
    }

    async fn validate_restore(&self, _tx: &mut dyn FleetTx, record: &LifecycleRecord) -> AppResult<Vec<String>> {
        let mut errors = Vec::new();
        if let Some(reading) = record.as_reading() {
            if reading.km_reported < 0 {
                errors.push(format!("El KM reportado no puede ser negativo ({} km)", reading.km_reported));
            }
        }
        Ok(errors)
    }

    async fn after_restore(
        &self,
        tx: &mut dyn FleetTx,
        record: &LifecycleRecord,
        _context: &LifecycleContext,
        revalidation: &RevalidationService,
    ) -> AppResult<()> {
        Self::revalidate_neighbors(tx, record, revalidation).await
    }
}

struct MaintenanceEventHooks;

#[async_trait]
impl LifecycleHooks for MaintenanceEventHooks {
    async fn model_warnings(
        &self,
        _tx: &mut dyn FleetTx,
        record: &LifecycleRecord,
        _cascade_total: usize,
    ) -> AppResult<Vec<ImpactWarning>> {
        let mut warnings = Vec::new();
        if let Some(amount) = record.as_maintenance().and_then(|m| m.amount) {
            if amount > Decimal::from(1000) {
                warnings.push(model_warning(
                    format!("Este mantenimiento tiene un costo alto ({}€).", amount),
                    Severity::Medium,
                ));
            }
        }
        Ok(warnings)
    }

    /// Con `vehicle_km: keep` el mantenimiento suelta su registro de km
    async fn before_delete(
        &self,
        tx: &mut dyn FleetTx,
        record: &LifecycleRecord,
        context: &mut LifecycleContext,
    ) -> AppResult<()> {
        let Some(maintenance) = record.as_maintenance() else {
            return Ok(());
        };
        let keeps_reading = context.cascade_decisions.get("vehicle_km") == Some(&CascadeDecision::Keep);

        if let (true, Some(reading_id)) = (keeps_reading, maintenance.reading_id) {
            let mut unlinked = maintenance.clone();
            unlinked.reading_id = None;
            tx.update_maintenance(&unlinked).await?;
            context
                .notes
                .insert("kept_reading_id".to_string(), serde_json::json!(reading_id));
            log::info!(
                "🔗 Mantenimiento {} desvinculado del registro de km {}",
                maintenance.id,
                reading_id
            );
        }
        Ok(())
    }

    async fn validate_restore(&self, _tx: &mut dyn FleetTx, record: &LifecycleRecord) -> AppResult<Vec<String>> {
        let mut errors = Vec::new();
        if let Some(maintenance) = record.as_maintenance() {
            if maintenance.register_km < 0 {
                errors.push(format!(
                    "El KM del mantenimiento no puede ser negativo ({} km)",
                    maintenance.register_km
                ));
            }
        }
        Ok(errors)
    }
}

fn has_linked_reading(record: &LifecycleRecord) -> bool {
    record.as_maintenance().map_or(false, |m| m.reading_id.is_some())
}

static COMPANY_POLICY: EntityPolicy = EntityPolicy {
    kind: EntityKind::Company,
    cascade_relations: &[
        CascadeRelation {
            name: "vehicles",
            target: EntityKind::Vehicle,
            key: ForeignKey::CompanyId,
            optional: false,
            condition: None,
        },
        CascadeRelation {
            name: "vehicle_kms",
            target: EntityKind::MileageReading,
            key: ForeignKey::CompanyId,
            optional: false,
            condition: None,
        },
        CascadeRelation {
            name: "maintenances",
            target: EntityKind::MaintenanceEvent,
            key: ForeignKey::CompanyId,
            optional: false,
            condition: None,
        },
    ],
    blocking_relations: &[],
    nullify_relations: &[],
    uniqueness_constraints: &[UniquenessConstraint {
        field: UniqueField::CompanyName,
        scope: None,
    }],
    parent_relations: &[],
    hooks: &CompanyHooks,
};

static VEHICLE_POLICY: EntityPolicy = EntityPolicy {
    kind: EntityKind::Vehicle,
    cascade_relations: &[
        CascadeRelation {
            name: "vehicle_kms",
            target: EntityKind::MileageReading,
            key: ForeignKey::VehicleId,
            optional: false,
            condition: None,
        },
        CascadeRelation {
            name: "maintenances",
            target: EntityKind::MaintenanceEvent,
            key: ForeignKey::VehicleId,
            optional: false,
            condition: None,
        },
    ],
    blocking_relations: &[],
    nullify_relations: &[],
    uniqueness_constraints: &[UniquenessConstraint {
        field: UniqueField::LicensePlate,
        scope: Some(ForeignKey::CompanyId),
    }],
    parent_relations: &[ParentRelation {
        name: "company",
        kind: EntityKind::Company,
        key: ForeignKey::CompanyId,
    }],
    hooks: &VehicleHooks,
};

static MILEAGE_READING_POLICY: EntityPolicy = EntityPolicy {
    kind: EntityKind::MileageReading,
    cascade_relations: &[],
    blocking_relations: &[],
    nullify_relations: &[NullifyRelation {
        name: "maintenance",
        target: EntityKind::MaintenanceEvent,
        key: ForeignKey::ReadingId,
        notify: true,
    }],
    uniqueness_constraints: &[],
    parent_relations: &[ParentRelation {
        name: "vehicle",
        kind: EntityKind::Vehicle,
        key: ForeignKey::VehicleId,
    }],
    hooks: &MileageReadingHooks,
};

static MAINTENANCE_EVENT_POLICY: EntityPolicy = EntityPolicy {
    kind: EntityKind::MaintenanceEvent,
    cascade_relations: &[CascadeRelation {
        name: "vehicle_km",
        target: EntityKind::MileageReading,
        key: ForeignKey::SourceMaintenance,
        optional: true,
        condition: Some(has_linked_reading),
    }],
    blocking_relations: &[],
    nullify_relations: &[NullifyRelation {
        name: "vehicle_km",
        target: EntityKind::MileageReading,
        key: ForeignKey::SourceMaintenance,
        notify: false,
    }],
    uniqueness_constraints: &[],
    parent_relations: &[ParentRelation {
        name: "vehicle",
        kind: EntityKind::Vehicle,
        key: ForeignKey::VehicleId,
    }],
    hooks: &MaintenanceEventHooks,
};

/// Política registrada para un tipo de entidad
pub fn policy_for(kind: EntityKind) -> &'static EntityPolicy {
    match kind {
        EntityKind::Company => &COMPANY_POLICY,
        EntityKind::Vehicle => &VEHICLE_POLICY,
        EntityKind::MileageReading => &MILEAGE_READING_POLICY,
        EntityKind::MaintenanceEvent => &MAINTENANCE_EVENT_POLICY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_keyed_by_kind() {
        for kind in [
            EntityKind::Company,
            EntityKind::Vehicle,
            EntityKind::MileageReading,
            EntityKind::MaintenanceEvent,
        ] {
            assert_eq!(policy_for(kind).kind, kind);
        }
    }

    #[test]
    fn test_reading_is_a_leaf() {
        let policy = policy_for(EntityKind::MileageReading);
        assert!(policy.cascade_relations.is_empty());
        assert_eq!(policy.nullify_relations[0].target, EntityKind::MaintenanceEvent);
    }

    #[test]
    fn test_maintenance_cascade_is_optional() {
        let relation = policy_for(EntityKind::MaintenanceEvent).cascade("vehicle_km").unwrap();
        assert!(relation.optional);
        assert!(policy_for(EntityKind::Vehicle)
            .cascade_relations
            .iter()
            .all(|r| !r.optional));
    }
}
