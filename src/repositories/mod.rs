//! Repositorios de flota
//!
//! `FleetStore` abre transacciones; `FleetTx` es la unidad de trabajo sobre la
//! que corren el detector de conflictos, los analizadores y los coordinadores.
//! Todo lo que se escribe dentro de una `FleetTx` se confirma junto o no se
//! confirma: una transacción descartada sin `commit` no deja rastro.

pub mod memory_fleet_repository;
pub mod pg_fleet_repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AuditLogEntry, AuditLogFilter, Company, CreateCompanyRequest, CreateVehicleRequest,
    EntityKind, ForeignKey, LifecycleRecord, MaintenanceEvent, MileageReading,
    NewAuditLogEntry, NewMaintenanceEvent, NewMileageReading, RecordRef, RecordScope,
    TimelineKey, UniqueField, Vehicle,
};
use crate::utils::errors::AppResult;

pub use memory_fleet_repository::{FailurePoint, InMemoryFleetRepository};
pub use pg_fleet_repository::PgFleetRepository;

/// Almacén relacional de flota (PostgreSQL o memoria)
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Transacción de escritura
    async fn begin(&self) -> AppResult<Box<dyn FleetTx>>;

    /// Transacción de solo lectura para análisis sin efectos
    async fn begin_read_only(&self) -> AppResult<Box<dyn FleetTx>>;
}

/// Unidad de trabajo transaccional
#[async_trait]
pub trait FleetTx: Send {
    /// Instante monotónico para marcas de borrado/restauración
    fn now(&self) -> DateTime<Utc>;

    // Lecturas por id (incluyen registros descartados)
    async fn find_company(&mut self, id: i64) -> AppResult<Option<Company>>;
    async fn find_vehicle(&mut self, id: i64) -> AppResult<Option<Vehicle>>;
    async fn find_reading(&mut self, id: i64) -> AppResult<Option<MileageReading>>;
    async fn find_maintenance(&mut self, id: i64) -> AppResult<Option<MaintenanceEvent>>;

    /// Lecturas vigentes estrictamente anteriores a `key`, la más cercana primero
    async fn readings_before(
        &mut self,
        vehicle_id: i64,
        key: TimelineKey,
        limit: Option<usize>,
    ) -> AppResult<Vec<MileageReading>>;

    /// Lecturas vigentes estrictamente posteriores a `key`, la más cercana primero
    async fn readings_after(
        &mut self,
        vehicle_id: i64,
        key: TimelineKey,
        limit: Option<usize>,
    ) -> AppResult<Vec<MileageReading>>;

    /// Todas las lecturas vigentes del vehículo ordenadas por (fecha, id)
    async fn kept_readings(&mut self, vehicle_id: i64) -> AppResult<Vec<MileageReading>>;

    /// Última lectura vigente del vehículo por (fecha, id)
    async fn latest_kept_reading(&mut self, vehicle_id: i64) -> AppResult<Option<MileageReading>>;

    /// Mantenimientos vigentes (de un vehículo o de toda la flota) por id ascendente
    async fn kept_maintenances(&mut self, vehicle_id: Option<i64>) -> AppResult<Vec<MaintenanceEvent>>;

    // Inserciones
    async fn insert_company(&mut self, request: &CreateCompanyRequest) -> AppResult<Company>;
    async fn insert_vehicle(
        &mut self,
        company_id: i64,
        request: &CreateVehicleRequest,
    ) -> AppResult<Vehicle>;
    async fn insert_reading(&mut self, reading: &NewMileageReading) -> AppResult<MileageReading>;
    async fn insert_maintenance(
        &mut self,
        maintenance: &NewMaintenanceEvent,
    ) -> AppResult<MaintenanceEvent>;

    // Actualizaciones de fila completa
    async fn update_reading(&mut self, reading: &MileageReading) -> AppResult<()>;
    async fn update_vehicle(&mut self, vehicle: &Vehicle) -> AppResult<()>;
    async fn update_maintenance(&mut self, maintenance: &MaintenanceEvent) -> AppResult<()>;
    async fn update_vehicle_mileage(&mut self, vehicle_id: i64, current_mileage: i64) -> AppResult<()>;

    /// Ids de `kind` cuya `key` apunta a `parent_id`, dentro de `scope`, por id ascendente
    async fn related_ids(
        &mut self,
        kind: EntityKind,
        key: ForeignKey,
        parent_id: i64,
        scope: RecordScope,
    ) -> AppResult<Vec<i64>>;

    /// Marca (`Some`) o limpia (`None`) el borrado lógico de un registro
    async fn set_discarded(
        &mut self,
        record: RecordRef,
        at: Option<DateTime<Utc>>,
        by: Option<Uuid>,
    ) -> AppResult<()>;

    /// Pone a NULL `key` en los registros vigentes de `kind` que apuntan a `parent_id`
    async fn nullify(&mut self, kind: EntityKind, key: ForeignKey, parent_id: i64) -> AppResult<u64>;

    /// Otro registro vigente de `kind` con el mismo valor único (y mismo ámbito)
    async fn find_unique_collision(
        &mut self,
        kind: EntityKind,
        field: UniqueField,
        value: &str,
        scope: Option<(ForeignKey, i64)>,
        exclude_id: i64,
    ) -> AppResult<Option<i64>>;

    // Auditoría (solo inserción y consulta)
    async fn insert_audit_entry(&mut self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry>;
    async fn query_audit_log(&mut self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLogEntry>>;

    // Puntos de guardado. Tras un fallo de escritura la transacción solo
    // admite `rollback_to_savepoint`; lo anterior al punto se conserva.
    async fn savepoint(&mut self, name: &'static str) -> AppResult<()>;
    async fn rollback_to_savepoint(&mut self, name: &'static str) -> AppResult<()>;
    async fn release_savepoint(&mut self, name: &'static str) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Carga cualquier registro gestionado por su referencia
pub async fn load_record(tx: &mut dyn FleetTx, record: RecordRef) -> AppResult<Option<LifecycleRecord>> {
    let loaded = match record.kind {
        EntityKind::Company => tx.find_company(record.id).await?.map(LifecycleRecord::Company),
        EntityKind::Vehicle => tx.find_vehicle(record.id).await?.map(LifecycleRecord::Vehicle),
        EntityKind::MileageReading => tx
            .find_reading(record.id)
            .await?
            .map(LifecycleRecord::MileageReading),
        EntityKind::MaintenanceEvent => tx
            .find_maintenance(record.id)
            .await?
            .map(LifecycleRecord::MaintenanceEvent),
    };

    Ok(loaded)
}
