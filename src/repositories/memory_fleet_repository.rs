//! Repositorio de flota en memoria
//!
//! Cada transacción de escritura toma el único candado de escritor, trabaja
//! sobre una copia de los datos y la publica en `commit`. Sin `commit` la copia
//! se descarta. Se usa en pruebas y en ejecuciones locales sin PostgreSQL.
//!
//! Como en PostgreSQL, un fallo de escritura deja la transacción abortada:
//! toda orden posterior falla hasta volver a un punto de guardado.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{FleetStore, FleetTx};
use crate::models::{
    AuditLogEntry, AuditLogFilter, Company, CreateCompanyRequest, CreateVehicleRequest,
    EntityKind, ForeignKey, MaintenanceEvent, MileageReading, NewAuditLogEntry,
    NewMaintenanceEvent, NewMileageReading, ReadingStatus, RecordRef, RecordScope,
    SourceRecord, TimelineKey, UniqueField, Vehicle,
};
use crate::utils::clock::MonotonicClock;
use crate::utils::errors::{AppError, AppResult};

/// Puntos donde las pruebas pueden forzar un fallo de escritura
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    AuditInsert,
    Nullify,
    SetDiscarded,
    UpdateReading,
    UpdateVehicleMileage,
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    company: i64,
    vehicle: i64,
    reading: i64,
    maintenance: i64,
}

#[derive(Debug, Clone, Default)]
struct FleetData {
    companies: BTreeMap<i64, Company>,
    vehicles: BTreeMap<i64, Vehicle>,
    readings: BTreeMap<i64, MileageReading>,
    maintenance: BTreeMap<i64, MaintenanceEvent>,
    audit_log: Vec<AuditLogEntry>,
    sequences: Sequences,
}

#[derive(Clone, Default)]
pub struct InMemoryFleetRepository {
    data: Arc<Mutex<FleetData>>,
    clock: Arc<MonotonicClock>,
    failures: Arc<StdMutex<HashSet<FailurePoint>>>,
}

impl InMemoryFleetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hace fallar toda escritura en `point` hasta `clear_failures`
    pub fn inject_failure(&self, point: FailurePoint) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(point);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }
}

#[async_trait]
impl FleetStore for InMemoryFleetRepository {
    async fn begin(&self) -> AppResult<Box<dyn FleetTx>> {
        let guard = self.data.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(InMemoryFleetTx {
            guard: Some(guard),
            working,
            savepoints: Vec::new(),
            aborted: false,
            clock: self.clock.clone(),
            failures: self.failures.clone(),
        }))
    }

    async fn begin_read_only(&self) -> AppResult<Box<dyn FleetTx>> {
        let working = self.data.lock().await.clone();

        Ok(Box::new(InMemoryFleetTx {
            guard: None,
            working,
            savepoints: Vec::new(),
            aborted: false,
            clock: self.clock.clone(),
            failures: self.failures.clone(),
        }))
    }
}

pub struct InMemoryFleetTx {
    /// `None` en transacciones de solo lectura
    guard: Option<OwnedMutexGuard<FleetData>>,
    working: FleetData,
    savepoints: Vec<(&'static str, FleetData)>,
    aborted: bool,
    clock: Arc<MonotonicClock>,
    failures: Arc<StdMutex<HashSet<FailurePoint>>>,
}

impl InMemoryFleetTx {
    fn live(&self) -> AppResult<()> {
        if self.aborted {
            return Err(AppError::Internal(
                "La transacción está abortada; se ignoran órdenes hasta el fin del bloque".to_string(),
            ));
        }
        Ok(())
    }

    fn writable(&mut self, point: Option<FailurePoint>) -> AppResult<()> {
        self.live()?;
        if self.guard.is_none() {
            return Err(AppError::Internal(
                "Escritura en una transacción de solo lectura".to_string(),
            ));
        }

        if let Some(point) = point {
            let injected = self
                .failures
                .lock()
                .map(|failures| failures.contains(&point))
                .unwrap_or(false);
            if injected {
                self.aborted = true;
                return Err(AppError::Internal(format!("Fallo inyectado en {:?}", point)));
            }
        }

        Ok(())
    }

    fn vehicle_readings(&self, vehicle_id: i64) -> Vec<&MileageReading> {
        let mut readings: Vec<&MileageReading> = self
            .working
            .readings
            .values()
            .filter(|r| r.vehicle_id == vehicle_id && r.is_kept())
            .collect();
        readings.sort_by_key(|r| r.timeline_key());
        readings
    }

    /// (id, valor de la clave, discarded_at) de cada fila de `kind`
    fn key_rows(&self, kind: EntityKind, key: ForeignKey) -> AppResult<Vec<(i64, Option<i64>, Option<DateTime<Utc>>)>> {
        let rows = match (kind, key) {
            (EntityKind::Vehicle, ForeignKey::CompanyId) => self
                .working
                .vehicles
                .values()
                .map(|v| (v.id, Some(v.company_id), v.discarded_at))
                .collect(),
            (EntityKind::MileageReading, ForeignKey::CompanyId) => self
                .working
                .readings
                .values()
                .map(|r| (r.id, Some(r.company_id), r.discarded_at))
                .collect(),
            (EntityKind::MileageReading, ForeignKey::VehicleId) => self
                .working
                .readings
                .values()
                .map(|r| (r.id, Some(r.vehicle_id), r.discarded_at))
                .collect(),
            (EntityKind::MileageReading, ForeignKey::SourceMaintenance) => self
                .working
                .readings
                .values()
                .map(|r| (r.id, r.source_record.maintenance_event_id(), r.discarded_at))
                .collect(),
            (EntityKind::MaintenanceEvent, ForeignKey::CompanyId) => self
                .working
                .maintenance
                .values()
                .map(|m| (m.id, Some(m.company_id), m.discarded_at))
                .collect(),
            (EntityKind::MaintenanceEvent, ForeignKey::VehicleId) => self
                .working
                .maintenance
                .values()
                .map(|m| (m.id, Some(m.vehicle_id), m.discarded_at))
                .collect(),
            (EntityKind::MaintenanceEvent, ForeignKey::ReadingId) => self
                .working
                .maintenance
                .values()
                .map(|m| (m.id, m.reading_id, m.discarded_at))
                .collect(),
            (kind, key) => {
                return Err(AppError::Internal(format!(
                    "{} no tiene la clave {}",
                    kind,
                    key.column()
                )))
            }
        };

        Ok(rows)
    }
}

#[async_trait]
impl FleetTx for InMemoryFleetTx {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn find_company(&mut self, id: i64) -> AppResult<Option<Company>> {
        self.live()?;
        Ok(self.working.companies.get(&id).cloned())
    }

    async fn find_vehicle(&mut self, id: i64) -> AppResult<Option<Vehicle>> {
        self.live()?;
        Ok(self.working.vehicles.get(&id).cloned())
    }

    async fn find_reading(&mut self, id: i64) -> AppResult<Option<MileageReading>> {
        self.live()?;
        Ok(self.working.readings.get(&id).cloned())
    }

    async fn find_maintenance(&mut self, id: i64) -> AppResult<Option<MaintenanceEvent>> {
        self.live()?;
        Ok(self.working.maintenance.get(&id).cloned())
    }

    async fn readings_before(
        &mut self,
        vehicle_id: i64,
        key: TimelineKey,
        limit: Option<usize>,
    ) -> AppResult<Vec<MileageReading>> {
        self.live()?;
        Ok(self
            .vehicle_readings(vehicle_id)
            .into_iter()
            .rev()
            .filter(|r| r.timeline_key() < key)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn readings_after(
        &mut self,
        vehicle_id: i64,
        key: TimelineKey,
        limit: Option<usize>,
    ) -> AppResult<Vec<MileageReading>> {
        self.live()?;
        Ok(self
            .vehicle_readings(vehicle_id)
            .into_iter()
            .filter(|r| r.timeline_key() > key)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn kept_readings(&mut self, vehicle_id: i64) -> AppResult<Vec<MileageReading>> {
        self.live()?;
        Ok(self.vehicle_readings(vehicle_id).into_iter().cloned().collect())
    }

    async fn latest_kept_reading(&mut self, vehicle_id: i64) -> AppResult<Option<MileageReading>> {
        self.live()?;
        Ok(self.vehicle_readings(vehicle_id).last().map(|r| (*r).clone()))
    }

    async fn kept_maintenances(&mut self, vehicle_id: Option<i64>) -> AppResult<Vec<MaintenanceEvent>> {
        self.live()?;
        Ok(self
            .working
            .maintenance
            .values()
            .filter(|m| m.is_kept() && vehicle_id.map_or(true, |id| m.vehicle_id == id))
            .cloned()
            .collect())
    }

    async fn insert_company(&mut self, request: &CreateCompanyRequest) -> AppResult<Company> {
        self.writable(None)?;
        let now = Utc::now();
        self.working.sequences.company += 1;
        let company = Company {
            id: self.working.sequences.company,
            name: request.name.clone(),
            tax_id: request.tax_id.clone(),
            max_daily_km: request.max_daily_km,
            discarded_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.companies.insert(company.id, company.clone());
        Ok(company)
    }

    async fn insert_vehicle(
        &mut self,
        company_id: i64,
        request: &CreateVehicleRequest,
    ) -> AppResult<Vehicle> {
        self.writable(None)?;
        if !self.working.companies.contains_key(&company_id) {
            return Err(AppError::NotFound(format!("Company #{} no existe", company_id)));
        }
        let now = Utc::now();
        self.working.sequences.vehicle += 1;
        let vehicle = Vehicle {
            id: self.working.sequences.vehicle,
            company_id,
            license_plate: request.license_plate.clone(),
            vin: request.vin.clone(),
            current_mileage: 0,
            discarded_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn insert_reading(&mut self, reading: &NewMileageReading) -> AppResult<MileageReading> {
        self.writable(None)?;
        if !self.working.vehicles.contains_key(&reading.vehicle_id) {
            return Err(AppError::NotFound(format!("Vehicle #{} no existe", reading.vehicle_id)));
        }
        let now = Utc::now();
        self.working.sequences.reading += 1;
        let stored = MileageReading {
            id: self.working.sequences.reading,
            vehicle_id: reading.vehicle_id,
            company_id: reading.company_id,
            input_date: reading.input_date,
            source: reading.source,
            source_record: reading.source_record,
            km_reported: reading.km_reported,
            km_normalized: None,
            status: ReadingStatus::Original,
            correction_notes: None,
            conflict_reasons: Vec::new(),
            discarded_at: None,
            discarded_by: None,
            created_at: now,
            updated_at: now,
        };
        self.working.readings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_maintenance(
        &mut self,
        maintenance: &NewMaintenanceEvent,
    ) -> AppResult<MaintenanceEvent> {
        self.writable(None)?;
        let now = Utc::now();
        self.working.sequences.maintenance += 1;
        let stored = MaintenanceEvent {
            id: self.working.sequences.maintenance,
            vehicle_id: maintenance.vehicle_id,
            company_id: maintenance.company_id,
            maintenance_date: maintenance.maintenance_date,
            register_km: maintenance.register_km,
            amount: maintenance.amount,
            description: maintenance.description.clone(),
            reading_id: None,
            discarded_at: None,
            created_at: now,
            updated_at: now,
        };
        self.working.maintenance.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_reading(&mut self, reading: &MileageReading) -> AppResult<()> {
        self.writable(Some(FailurePoint::UpdateReading))?;
        let slot = self
            .working
            .readings
            .get_mut(&reading.id)
            .ok_or_else(|| AppError::NotFound(format!("MileageReading #{} no existe", reading.id)))?;
        *slot = MileageReading {
            updated_at: Utc::now(),
            ..reading.clone()
        };
        Ok(())
    }

    async fn update_vehicle(&mut self, vehicle: &Vehicle) -> AppResult<()> {
        self.writable(None)?;
        let slot = self
            .working
            .vehicles
            .get_mut(&vehicle.id)
            .ok_or_else(|| AppError::NotFound(format!("Vehicle #{} no existe", vehicle.id)))?;
        *slot = Vehicle {
            updated_at: Utc::now(),
            ..vehicle.clone()
        };
        Ok(())
    }

    async fn update_maintenance(&mut self, maintenance: &MaintenanceEvent) -> AppResult<()> {
        self.writable(None)?;
        let slot = self.working.maintenance.get_mut(&maintenance.id).ok_or_else(|| {
            AppError::NotFound(format!("MaintenanceEvent #{} no existe", maintenance.id))
        })?;
        *slot = MaintenanceEvent {
            updated_at: Utc::now(),
            ..maintenance.clone()
        };
        Ok(())
    }

    async fn update_vehicle_mileage(&mut self, vehicle_id: i64, current_mileage: i64) -> AppResult<()> {
        self.writable(Some(FailurePoint::UpdateVehicleMileage))?;
        let vehicle = self
            .working
            .vehicles
            .get_mut(&vehicle_id)
            .ok_or_else(|| AppError::NotFound(format!("Vehicle #{} no existe", vehicle_id)))?;
        vehicle.current_mileage = current_mileage;
        vehicle.updated_at = Utc::now();
        Ok(())
    }

    async fn related_ids(
        &mut self,
        kind: EntityKind,
        key: ForeignKey,
        parent_id: i64,
        scope: RecordScope,
    ) -> AppResult<Vec<i64>> {
        self.live()?;
        Ok(self
            .key_rows(kind, key)?
            .into_iter()
            .filter(|(_, value, discarded_at)| *value == Some(parent_id) && scope.matches(*discarded_at))
            .map(|(id, _, _)| id)
            .collect())
    }

    async fn set_discarded(
        &mut self,
        record: RecordRef,
        at: Option<DateTime<Utc>>,
        by: Option<Uuid>,
    ) -> AppResult<()> {
        self.writable(Some(FailurePoint::SetDiscarded))?;
        let now = Utc::now();
        let missing = || AppError::NotFound(format!("{} no existe", record));

        match record.kind {
            EntityKind::Company => {
                let company = self.working.companies.get_mut(&record.id).ok_or_else(missing)?;
                company.discarded_at = at;
                company.updated_at = now;
            }
            EntityKind::Vehicle => {
                let vehicle = self.working.vehicles.get_mut(&record.id).ok_or_else(missing)?;
                vehicle.discarded_at = at;
                vehicle.updated_at = now;
            }
            EntityKind::MileageReading => {
                let reading = self.working.readings.get_mut(&record.id).ok_or_else(missing)?;
                reading.discarded_at = at;
                reading.discarded_by = if at.is_some() { by } else { None };
                reading.updated_at = now;
            }
            EntityKind::MaintenanceEvent => {
                let maintenance = self.working.maintenance.get_mut(&record.id).ok_or_else(missing)?;
                maintenance.discarded_at = at;
                maintenance.updated_at = now;
            }
        }

        Ok(())
    }

    async fn nullify(&mut self, kind: EntityKind, key: ForeignKey, parent_id: i64) -> AppResult<u64> {
        self.writable(Some(FailurePoint::Nullify))?;
        let now = Utc::now();
        let mut affected = 0u64;

        match (kind, key) {
            (EntityKind::MaintenanceEvent, ForeignKey::ReadingId) => {
                for maintenance in self.working.maintenance.values_mut() {
                    if maintenance.is_kept() && maintenance.reading_id == Some(parent_id) {
                        maintenance.reading_id = None;
                        maintenance.updated_at = now;
                        affected += 1;
                    }
                }
            }
            (EntityKind::MileageReading, ForeignKey::SourceMaintenance) => {
                for reading in self.working.readings.values_mut() {
                    if reading.is_kept() && reading.source_record == SourceRecord::MaintenanceEvent(parent_id) {
                        reading.source_record = SourceRecord::None;
                        reading.updated_at = now;
                        affected += 1;
                    }
                }
            }
            (kind, key) => {
                return Err(AppError::Internal(format!(
                    "La clave {} de {} no admite NULL",
                    key.column(),
                    kind
                )))
            }
        }

        Ok(affected)
    }

    async fn find_unique_collision(
        &mut self,
        kind: EntityKind,
        field: UniqueField,
        value: &str,
        scope: Option<(ForeignKey, i64)>,
        exclude_id: i64,
    ) -> AppResult<Option<i64>> {
        self.live()?;
        let collision = match (kind, field) {
            (EntityKind::Company, UniqueField::CompanyName) => self
                .working
                .companies
                .values()
                .find(|c| c.is_kept() && c.id != exclude_id && c.name == value)
                .map(|c| c.id),
            (EntityKind::Vehicle, UniqueField::LicensePlate) => self
                .working
                .vehicles
                .values()
                .filter(|v| match scope {
                    Some((ForeignKey::CompanyId, company_id)) => v.company_id == company_id,
                    _ => true,
                })
                .find(|v| v.is_kept() && v.id != exclude_id && v.license_plate == value)
                .map(|v| v.id),
            (kind, field) => {
                return Err(AppError::Internal(format!(
                    "{} no tiene el campo único {}",
                    kind,
                    field.column()
                )))
            }
        };

        Ok(collision)
    }

    async fn insert_audit_entry(&mut self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        self.writable(Some(FailurePoint::AuditInsert))?;
        let stored = entry.into_entry(Uuid::new_v4());
        self.working.audit_log.push(stored.clone());
        Ok(stored)
    }

    async fn query_audit_log(&mut self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLogEntry>> {
        self.live()?;
        let mut entries: Vec<AuditLogEntry> = self
            .working
            .audit_log
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();

        entries.sort_by(|a, b| b.performed_at.cmp(&a.performed_at));

        Ok(entries
            .into_iter()
            .skip(filter.effective_offset() as usize)
            .take(filter.effective_limit() as usize)
            .collect())
    }

    async fn savepoint(&mut self, name: &'static str) -> AppResult<()> {
        self.live()?;
        self.savepoints.push((name, self.working.clone()));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> AppResult<()> {
        let position = self
            .savepoints
            .iter()
            .rposition(|(saved, _)| *saved == name)
            .ok_or_else(|| AppError::Internal(format!("No existe el punto de guardado {}", name)))?;
        self.savepoints.truncate(position + 1);
        self.working = self.savepoints[position].1.clone();
        self.aborted = false;
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &'static str) -> AppResult<()> {
        self.live()?;
        let position = self
            .savepoints
            .iter()
            .rposition(|(saved, _)| *saved == name)
            .ok_or_else(|| AppError::Internal(format!("No existe el punto de guardado {}", name)))?;
        self.savepoints.truncate(position);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        if self.aborted {
            return Err(AppError::Internal(
                "La transacción abortada no se puede confirmar".to_string(),
            ));
        }
        let InMemoryFleetTx { guard, working, .. } = *self;
        match guard {
            Some(mut guard) => {
                *guard = working;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    async fn seed(store: &InMemoryFleetRepository) -> (Company, Vehicle) {
        let mut tx = store.begin().await.unwrap();
        let company = tx
            .insert_company(&CreateCompanyRequest {
                name: "Transportes Norte".to_string(),
                tax_id: None,
                max_daily_km: None,
            })
            .await
            .unwrap();
        let vehicle = tx
            .insert_vehicle(
                company.id,
                &CreateVehicleRequest {
                    license_plate: "1234ABC".to_string(),
                    vin: None,
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (company, vehicle)
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryFleetRepository::new();
        let (company, vehicle) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_reading(&NewMileageReading {
            vehicle_id: vehicle.id,
            company_id: company.id,
            input_date: date(1),
            source: Default::default(),
            source_record: SourceRecord::None,
            km_reported: 100,
        })
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let mut read = store.begin_read_only().await.unwrap();
        assert!(read.kept_readings(vehicle.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeline_queries_are_ordered() {
        let store = InMemoryFleetRepository::new();
        let (company, vehicle) = seed(&store).await;

        let mut tx = store.begin().await.unwrap();
        for (day, km) in [(3, 300), (1, 100), (2, 200), (2, 250)] {
            tx.insert_reading(&NewMileageReading {
                vehicle_id: vehicle.id,
                company_id: company.id,
                input_date: date(day),
                source: Default::default(),
                source_record: SourceRecord::None,
                km_reported: km,
            })
            .await
            .unwrap();
        }

        let pivot = TimelineKey { date: date(2), id: 3 };
        let before: Vec<i64> = tx
            .readings_before(vehicle.id, pivot, None)
            .await
            .unwrap()
            .iter()
            .map(|r| r.km_reported)
            .collect();
        let after: Vec<i64> = tx
            .readings_after(vehicle.id, pivot, Some(5))
            .await
            .unwrap()
            .iter()
            .map(|r| r.km_reported)
            .collect();

        assert_eq!(before, vec![100]);
        assert_eq!(after, vec![250, 300]);
        assert_eq!(tx.latest_kept_reading(vehicle.id).await.unwrap().unwrap().km_reported, 300);
    }

    #[tokio::test]
    async fn test_read_only_transaction_rejects_writes() {
        let store = InMemoryFleetRepository::new();
        let (_, vehicle) = seed(&store).await;

        let mut read = store.begin_read_only().await.unwrap();
        assert!(read.update_vehicle_mileage(vehicle.id, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_write_aborts_until_savepoint_rollback() {
        let store = InMemoryFleetRepository::new();
        let (_, vehicle) = seed(&store).await;
        store.inject_failure(FailurePoint::UpdateVehicleMileage);

        let mut tx = store.begin().await.unwrap();
        tx.savepoint("mileage").await.unwrap();
        assert!(tx.update_vehicle_mileage(vehicle.id, 10).await.is_err());
        assert!(tx.find_vehicle(vehicle.id).await.is_err());

        tx.rollback_to_savepoint("mileage").await.unwrap();
        assert_eq!(tx.find_vehicle(vehicle.id).await.unwrap().unwrap().current_mileage, 0);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_aborted_transaction_cannot_commit() {
        let store = InMemoryFleetRepository::new();
        let (_, vehicle) = seed(&store).await;
        store.inject_failure(FailurePoint::UpdateVehicleMileage);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.update_vehicle_mileage(vehicle.id, 10).await.is_err());
        assert!(tx.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = InMemoryFleetRepository::new();
        let (_, vehicle) = seed(&store).await;
        store.inject_failure(FailurePoint::UpdateVehicleMileage);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.update_vehicle_mileage(vehicle.id, 10).await.is_err());
        drop(tx);

        store.clear_failures();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.update_vehicle_mileage(vehicle.id, 10).await.is_ok());
    }
}
