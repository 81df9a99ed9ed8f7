//! Servicio de mantenimientos
//!
//! Un mantenimiento puede generar su propio registro de km (origen
//! `maintenance`). Ambos se crean y se vinculan en la misma transacción, y
//! desde aquí se mantienen sincronizados: edición con arrastre del km,
//! sincronización explícita y alertas de registros perdidos o desfasados.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::config::ReconciliationConfig;
use crate::models::{
    CreateMaintenanceRequest, EntityKind, ForeignKey, MaintenanceAlertType, MaintenanceEvent,
    MaintenanceKmStatus, MileageReading, NewMaintenanceEvent, NewMileageReading, ReadingSource,
    ReadingStatus, RecordRef, RecordScope, SourceRecord, UpdateMaintenanceRequest, UpdateReadingRequest,
};
use crate::repositories::{FleetStore, FleetTx};
use crate::services::reading_service::{finish, ReadingMutation, ReadingService};
use crate::utils::errors::{bad_request_error, AppError, AppResult};

/// Mantenimiento creado o editado, con el registro de km que se tocó
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceChange {
    pub maintenance: MaintenanceEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub km_record: Option<ReadingMutation>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    AlreadySynced,
    Restored,
    Created,
    Updated,
}

impl SyncAction {
    pub fn message(&self) -> &'static str {
        match self {
            SyncAction::AlreadySynced => "El KM ya está sincronizado",
            SyncAction::Restored => "Registro de KM restaurado y actualizado",
            SyncAction::Created => "Registro de KM creado y vinculado",
            SyncAction::Updated => "Registro de KM actualizado",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceSync {
    pub maintenance: MaintenanceEvent,
    pub action: SyncAction,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub km_record: Option<ReadingMutation>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MaintenanceKmAlert {
    pub maintenance_id: i64,
    pub vehicle_id: i64,
    pub maintenance_date: NaiveDate,
    pub km_status: MaintenanceKmStatus,
    pub is_conflictive: bool,
    pub is_desynchronized: bool,
    pub has_issues: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MaintenanceAlerts {
    /// Mantenimientos revisados, antes de filtrar por tipo
    pub total: usize,
    pub with_issues: usize,
    pub maintenances: Vec<MaintenanceKmAlert>,
}

pub struct MaintenanceService {
    store: Arc<dyn FleetStore>,
    readings: ReadingService,
}

impl MaintenanceService {
    pub fn new(store: Arc<dyn FleetStore>, config: &ReconciliationConfig) -> Self {
        Self {
            readings: ReadingService::new(store.clone(), config),
            store,
        }
    }

    pub async fn create_maintenance(
        &self,
        vehicle_id: i64,
        request: CreateMaintenanceRequest,
    ) -> AppResult<MaintenanceChange> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let result = self.create_in_tx(tx.as_mut(), vehicle_id, &request).await;
        let creation = finish(tx, result).await?;

        log::info!(
            "🛠️ Mantenimiento {} creado para el vehículo {}{}",
            creation.maintenance.id,
            vehicle_id,
            if creation.km_record.is_some() { " con registro de km" } else { "" }
        );
        Ok(creation)
    }

    async fn create_in_tx(
        &self,
        tx: &mut dyn FleetTx,
        vehicle_id: i64,
        request: &CreateMaintenanceRequest,
    ) -> AppResult<MaintenanceChange> {
        let vehicle = tx
            .find_vehicle(vehicle_id)
            .await?
            .filter(|v| v.is_kept())
            .ok_or_else(|| AppError::NotFound("Vehículo no encontrado".to_string()))?;

        let mut maintenance = tx
            .insert_maintenance(&NewMaintenanceEvent {
                vehicle_id: vehicle.id,
                company_id: vehicle.company_id,
                maintenance_date: request.maintenance_date,
                register_km: request.register_km,
                amount: request.amount,
                description: request.description.clone(),
            })
            .await?;

        if !request.create_km_record {
            return Ok(MaintenanceChange {
                maintenance,
                km_record: None,
                warnings: Vec::new(),
            });
        }

        let km_record = self.create_linked_reading(tx, &mut maintenance).await?;
        let mut warnings = Vec::new();
        if km_record.reading.status == ReadingStatus::Conflictive {
            warnings.push("El registro de KM fue marcado como conflictivo y requiere revisión".to_string());
        }

        Ok(MaintenanceChange {
            maintenance,
            km_record: Some(km_record),
            warnings,
        })
    }

    /// Edita el mantenimiento. Con `create_km_record` crea el registro si no
    /// tiene; con `update_km_record` lleva el km nuevo a su registro.
    pub async fn update_maintenance(
        &self,
        maintenance_id: i64,
        request: UpdateMaintenanceRequest,
    ) -> AppResult<MaintenanceChange> {
        request.validate()?;
        if request.is_empty() {
            return Err(bad_request_error("No hay cambios que aplicar"));
        }

        let mut tx = self.store.begin().await?;
        let result = self.update_in_tx(tx.as_mut(), maintenance_id, &request).await;
        let change = finish(tx, result).await?;

        log::info!("✏️ Mantenimiento {} actualizado", maintenance_id);
        Ok(change)
    }

    async fn update_in_tx(
        &self,
        tx: &mut dyn FleetTx,
        maintenance_id: i64,
        request: &UpdateMaintenanceRequest,
    ) -> AppResult<MaintenanceChange> {
        let mut maintenance = kept_maintenance(tx, maintenance_id).await?;
        if let Some(maintenance_date) = request.maintenance_date {
            maintenance.maintenance_date = maintenance_date;
        }
        if let Some(register_km) = request.register_km {
            maintenance.register_km = register_km;
        }
        if request.amount.is_some() {
            maintenance.amount = request.amount;
        }
        if request.description.is_some() {
            maintenance.description = request.description.clone();
        }
        tx.update_maintenance(&maintenance).await?;

        let linked = linked_reading(tx, &maintenance).await?.filter(|r| r.is_kept());
        let mut warnings = Vec::new();

        let km_record = match (linked, request.register_km) {
            (None, _) if request.create_km_record => {
                let created = self.create_linked_reading(tx, &mut maintenance).await?;
                warnings.push("Registro de KM creado y vinculado".to_string());
                if created.reading.status == ReadingStatus::Conflictive {
                    warnings.push("El registro de KM fue marcado como conflictivo y requiere revisión".to_string());
                }
                Some(created)
            }
            (Some(reading), Some(register_km)) if request.update_km_record => {
                let updated = self
                    .readings
                    .update_in_tx(
                        tx,
                        reading.id,
                        &UpdateReadingRequest {
                            km_reported: Some(register_km),
                            km_normalized: Some(register_km),
                            input_date: None,
                        },
                    )
                    .await?;
                if updated.reading.status == ReadingStatus::Conflictive {
                    warnings.push("El registro de KM actualizado está en conflicto".to_string());
                }
                Some(updated)
            }
            _ => None,
        };

        Ok(MaintenanceChange {
            maintenance,
            km_record,
            warnings,
        })
    }

    /// Vuelve a alinear el registro de km con el mantenimiento: restaura el
    /// registro descartado que salió de él (o crea uno nuevo) si no hay
    /// vínculo vigente, y si lo hay pero está desfasado lo actualiza.
    pub async fn sync_km(&self, maintenance_id: i64) -> AppResult<MaintenanceSync> {
        let mut tx = self.store.begin().await?;
        let result = self.sync_in_tx(tx.as_mut(), maintenance_id).await;
        let sync = finish(tx, result).await?;

        log::info!("🔗 Sincronización de km del mantenimiento {}: {}", maintenance_id, sync.message);
        Ok(sync)
    }

    async fn sync_in_tx(&self, tx: &mut dyn FleetTx, maintenance_id: i64) -> AppResult<MaintenanceSync> {
        let mut maintenance = kept_maintenance(tx, maintenance_id).await?;
        tx.find_vehicle(maintenance.vehicle_id)
            .await?
            .filter(|v| v.is_kept())
            .ok_or_else(|| AppError::NotFound("Vehículo no encontrado".to_string()))?;

        let linked = linked_reading(tx, &maintenance).await?.filter(|r| r.is_kept());

        let (action, km_record) = match linked {
            Some(reading) if maintenance.is_desynchronized_with(&reading) => {
                let updated = self
                    .readings
                    .update_in_tx(
                        tx,
                        reading.id,
                        &UpdateReadingRequest {
                            km_reported: Some(maintenance.register_km),
                            km_normalized: Some(maintenance.register_km),
                            input_date: Some(maintenance.maintenance_date),
                        },
                    )
                    .await?;
                (SyncAction::Updated, Some(updated))
            }
            Some(_) => (SyncAction::AlreadySynced, None),
            None => match discarded_source_reading(tx, &maintenance).await? {
                Some(reading) => {
                    let restored = self.restore_linked_reading(tx, &mut maintenance, reading).await?;
                    (SyncAction::Restored, Some(restored))
                }
                None => {
                    let created = self.create_linked_reading(tx, &mut maintenance).await?;
                    (SyncAction::Created, Some(created))
                }
            },
        };

        Ok(MaintenanceSync {
            maintenance,
            action,
            message: action.message().to_string(),
            km_record,
        })
    }

    /// Estado del registro de km de cada mantenimiento vigente
    pub async fn alerts(
        &self,
        vehicle_id: Option<i64>,
        alert_type: Option<MaintenanceAlertType>,
    ) -> AppResult<MaintenanceAlerts> {
        let mut tx = self.store.begin_read_only().await?;
        let result = alerts_in_tx(tx.as_mut(), vehicle_id, alert_type).await;
        tx.rollback().await?;
        result
    }

    /// Crea el registro de km del mantenimiento y lo vincula en ambos sentidos
    async fn create_linked_reading(
        &self,
        tx: &mut dyn FleetTx,
        maintenance: &mut MaintenanceEvent,
    ) -> AppResult<ReadingMutation> {
        let km_record = self
            .readings
            .create_in_tx(
                tx,
                &NewMileageReading {
                    vehicle_id: maintenance.vehicle_id,
                    company_id: maintenance.company_id,
                    input_date: maintenance.maintenance_date,
                    source: ReadingSource::Maintenance,
                    source_record: SourceRecord::MaintenanceEvent(maintenance.id),
                    km_reported: maintenance.register_km,
                },
            )
            .await?;

        maintenance.reading_id = Some(km_record.reading.id);
        tx.update_maintenance(maintenance).await?;
        Ok(km_record)
    }

    /// Devuelve a la línea temporal un registro descartado del mantenimiento,
    /// con los datos actuales de este, y revalida su ventana
    async fn restore_linked_reading(
        &self,
        tx: &mut dyn FleetTx,
        maintenance: &mut MaintenanceEvent,
        reading: MileageReading,
    ) -> AppResult<ReadingMutation> {
        tx.set_discarded(RecordRef::new(EntityKind::MileageReading, reading.id), None, None)
            .await?;

        let restored = MileageReading {
            input_date: maintenance.maintenance_date,
            km_reported: maintenance.register_km,
            km_normalized: None,
            status: ReadingStatus::Original,
            conflict_reasons: Vec::new(),
            correction_notes: None,
            discarded_at: None,
            discarded_by: None,
            ..reading
        };
        tx.update_reading(&restored).await?;

        maintenance.reading_id = Some(restored.id);
        tx.update_maintenance(maintenance).await?;

        self.readings.settle_in_tx(tx, &restored, None).await
    }
}

async fn kept_maintenance(tx: &mut dyn FleetTx, maintenance_id: i64) -> AppResult<MaintenanceEvent> {
    tx.find_maintenance(maintenance_id)
        .await?
        .filter(|m| m.is_kept())
        .ok_or_else(|| AppError::NotFound("Mantenimiento no encontrado".to_string()))
}

/// Registro apuntado por `reading_id`, vigente o no
async fn linked_reading(tx: &mut dyn FleetTx, maintenance: &MaintenanceEvent) -> AppResult<Option<MileageReading>> {
    match maintenance.reading_id {
        Some(reading_id) => tx.find_reading(reading_id).await,
        None => Ok(None),
    }
}

/// Último registro descartado que salió de este mantenimiento
async fn discarded_source_reading(
    tx: &mut dyn FleetTx,
    maintenance: &MaintenanceEvent,
) -> AppResult<Option<MileageReading>> {
    let ids = tx
        .related_ids(
            EntityKind::MileageReading,
            ForeignKey::SourceMaintenance,
            maintenance.id,
            RecordScope::Discarded,
        )
        .await?;

    let mut latest: Option<MileageReading> = None;
    for id in ids {
        let Some(reading) = tx.find_reading(id).await? else {
            continue;
        };
        if reading.vehicle_id != maintenance.vehicle_id {
            continue;
        }
        if latest.as_ref().map_or(true, |l| reading.discarded_at > l.discarded_at) {
            latest = Some(reading);
        }
    }
    Ok(latest)
}

async fn alerts_in_tx(
    tx: &mut dyn FleetTx,
    vehicle_id: Option<i64>,
    alert_type: Option<MaintenanceAlertType>,
) -> AppResult<MaintenanceAlerts> {
    let maintenances = tx.kept_maintenances(vehicle_id).await?;
    let total = maintenances.len();

    let mut alerts = Vec::with_capacity(total);
    for maintenance in &maintenances {
        let linked = linked_reading(tx, maintenance).await?;
        let km_status = match &linked {
            Some(reading) if reading.is_kept() => MaintenanceKmStatus::Active,
            Some(_) => MaintenanceKmStatus::Deleted,
            None if discarded_source_reading(tx, maintenance).await?.is_some() => MaintenanceKmStatus::Deleted,
            None => MaintenanceKmStatus::NoRecord,
        };
        alerts.push(km_alert(maintenance, km_status, linked.as_ref().filter(|r| r.is_kept())));
    }

    if let Some(alert_type) = alert_type {
        alerts.retain(|alert| matches_alert_type(alert, alert_type));
    }

    Ok(MaintenanceAlerts {
        total,
        with_issues: alerts.iter().filter(|a| a.has_issues).count(),
        maintenances: alerts,
    })
}

fn km_alert(
    maintenance: &MaintenanceEvent,
    km_status: MaintenanceKmStatus,
    kept_reading: Option<&MileageReading>,
) -> MaintenanceKmAlert {
    let is_conflictive = kept_reading.map_or(false, |r| r.status == ReadingStatus::Conflictive);
    let is_desynchronized = kept_reading.map_or(false, |r| maintenance.is_desynchronized_with(r));

    MaintenanceKmAlert {
        maintenance_id: maintenance.id,
        vehicle_id: maintenance.vehicle_id,
        maintenance_date: maintenance.maintenance_date,
        km_status,
        is_conflictive,
        is_desynchronized,
        has_issues: km_status != MaintenanceKmStatus::Active || is_conflictive || is_desynchronized,
    }
}

fn matches_alert_type(alert: &MaintenanceKmAlert, alert_type: MaintenanceAlertType) -> bool {
    match alert_type {
        MaintenanceAlertType::Deleted => alert.km_status == MaintenanceKmStatus::Deleted,
        MaintenanceAlertType::NoRecord => alert.km_status == MaintenanceKmStatus::NoRecord,
        MaintenanceAlertType::Desynchronized => alert.is_desynchronized,
        MaintenanceAlertType::Conflictive => alert.is_conflictive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn maintenance(register_km: i64) -> MaintenanceEvent {
        MaintenanceEvent {
            id: 7,
            vehicle_id: 1,
            company_id: 1,
            maintenance_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            register_km,
            amount: None,
            description: None,
            reading_id: Some(3),
            discarded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn reading(km: i64, status: ReadingStatus) -> MileageReading {
        MileageReading {
            id: 3,
            vehicle_id: 1,
            company_id: 1,
            input_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            source: ReadingSource::Maintenance,
            source_record: SourceRecord::MaintenanceEvent(7),
            km_reported: km,
            km_normalized: None,
            status,
            correction_notes: None,
            conflict_reasons: Vec::new(),
            discarded_at: None,
            discarded_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_alert_for_synchronized_reading_has_no_issues() {
        let alert = km_alert(
            &maintenance(42_000),
            MaintenanceKmStatus::Active,
            Some(&reading(42_000, ReadingStatus::Original)),
        );
        assert!(!alert.has_issues);
    }

    #[test]
    fn test_alert_flags_desynchronized_and_conflictive() {
        let alert = km_alert(
            &maintenance(42_500),
            MaintenanceKmStatus::Active,
            Some(&reading(42_000, ReadingStatus::Conflictive)),
        );
        assert!(alert.is_desynchronized);
        assert!(alert.is_conflictive);
        assert!(matches_alert_type(&alert, MaintenanceAlertType::Desynchronized));
        assert!(!matches_alert_type(&alert, MaintenanceAlertType::NoRecord));
    }

    #[test]
    fn test_missing_record_is_an_issue() {
        let alert = km_alert(&maintenance(42_000), MaintenanceKmStatus::NoRecord, None);
        assert!(alert.has_issues);
        assert!(!alert.is_desynchronized);
        assert!(matches_alert_type(&alert, MaintenanceAlertType::NoRecord));
    }
}
