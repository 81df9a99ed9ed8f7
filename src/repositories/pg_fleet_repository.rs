//! Repositorio de flota sobre PostgreSQL
//!
//! Cada `PgFleetTx` envuelve una transacción de SQLx. Los nombres de tabla y
//! columna que se interpolan en SQL salen siempre de enums cerrados
//! (`EntityKind::table`, `ForeignKey::column`), nunca de entrada del usuario.
//! Lo mismo vale para los nombres de punto de guardado (`&'static str`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use super::{FleetStore, FleetTx};
use crate::models::{
    AuditLogEntry, AuditLogFilter, Company, CreateCompanyRequest, CreateVehicleRequest,
    EntityKind, ForeignKey, MaintenanceEvent, MileageReading, MileageReadingRow,
    NewAuditLogEntry, NewMaintenanceEvent, NewMileageReading, RecordRef, RecordScope,
    SourceRecord, TimelineKey, UniqueField, Vehicle,
};
use crate::utils::clock::MonotonicClock;
use crate::utils::errors::{AppError, AppResult};

const READING_COLUMNS: &str = "id, vehicle_id, company_id, input_date, source, source_record_type, \
     source_record_id, km_reported, km_normalized, status, correction_notes, conflict_reasons, \
     discarded_at, discarded_by, created_at, updated_at";

#[derive(Clone)]
pub struct PgFleetRepository {
    pool: PgPool,
    clock: Arc<MonotonicClock>,
}

impl PgFleetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl FleetStore for PgFleetRepository {
    async fn begin(&self) -> AppResult<Box<dyn FleetTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgFleetTx {
            tx,
            clock: self.clock.clone(),
            read_only: false,
        }))
    }

    async fn begin_read_only(&self) -> AppResult<Box<dyn FleetTx>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgFleetTx {
            tx,
            clock: self.clock.clone(),
            read_only: true,
        }))
    }
}

pub struct PgFleetTx {
    tx: Transaction<'static, Postgres>,
    clock: Arc<MonotonicClock>,
    read_only: bool,
}

impl PgFleetTx {
    fn reading_rows(rows: Vec<MileageReadingRow>) -> AppResult<Vec<MileageReading>> {
        rows.into_iter().map(MileageReading::try_from).collect()
    }

    /// Condición SQL para que `key` de `kind` apunte a `$1`
    fn key_condition(kind: EntityKind, key: ForeignKey) -> AppResult<String> {
        match (kind, key) {
            (EntityKind::Vehicle, ForeignKey::CompanyId)
            | (EntityKind::MileageReading, ForeignKey::CompanyId)
            | (EntityKind::MileageReading, ForeignKey::VehicleId)
            | (EntityKind::MaintenanceEvent, ForeignKey::CompanyId)
            | (EntityKind::MaintenanceEvent, ForeignKey::VehicleId)
            | (EntityKind::MaintenanceEvent, ForeignKey::ReadingId) => {
                Ok(format!("{} = $1", key.column()))
            }
            (EntityKind::MileageReading, ForeignKey::SourceMaintenance) => Ok(format!(
                "source_record_type = '{}' AND source_record_id = $1",
                SourceRecord::MAINTENANCE_EVENT_TYPE
            )),
            (kind, key) => Err(AppError::Internal(format!(
                "{} no tiene la clave {}",
                kind,
                key.column()
            ))),
        }
    }
}

#[async_trait]
impl FleetTx for PgFleetTx {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn find_company(&mut self, id: i64) -> AppResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(company)
    }

    async fn find_vehicle(&mut self, id: i64) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(vehicle)
    }

    async fn find_reading(&mut self, id: i64) -> AppResult<Option<MileageReading>> {
        let row = sqlx::query_as::<_, MileageReadingRow>(&format!(
            "SELECT {} FROM mileage_readings WHERE id = $1",
            READING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(MileageReading::try_from).transpose()
    }

    async fn find_maintenance(&mut self, id: i64) -> AppResult<Option<MaintenanceEvent>> {
        let maintenance =
            sqlx::query_as::<_, MaintenanceEvent>("SELECT * FROM maintenance_events WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(maintenance)
    }

    async fn readings_before(
        &mut self,
        vehicle_id: i64,
        key: TimelineKey,
        limit: Option<usize>,
    ) -> AppResult<Vec<MileageReading>> {
        let rows = sqlx::query_as::<_, MileageReadingRow>(&format!(
            r#"
            SELECT {} FROM mileage_readings
            WHERE vehicle_id = $1 AND discarded_at IS NULL
              AND (input_date, id) < ($2, $3)
            ORDER BY input_date DESC, id DESC
            LIMIT $4
            "#,
            READING_COLUMNS
        ))
        .bind(vehicle_id)
        .bind(key.date)
        .bind(key.id)
        .bind(limit.map(|l| l as i64))
        .fetch_all(&mut *self.tx)
        .await?;

        Self::reading_rows(rows)
    }

    async fn readings_after(
        &mut self,
        vehicle_id: i64,
        key: TimelineKey,
        limit: Option<usize>,
    ) -> AppResult<Vec<MileageReading>> {
        let rows = sqlx::query_as::<_, MileageReadingRow>(&format!(
            r#"
            SELECT {} FROM mileage_readings
            WHERE vehicle_id = $1 AND discarded_at IS NULL
              AND (input_date, id) > ($2, $3)
            ORDER BY input_date ASC, id ASC
            LIMIT $4
            "#,
            READING_COLUMNS
        ))
        .bind(vehicle_id)
        .bind(key.date)
        .bind(key.id)
        .bind(limit.map(|l| l as i64))
        .fetch_all(&mut *self.tx)
        .await?;

        Self::reading_rows(rows)
    }

    async fn kept_readings(&mut self, vehicle_id: i64) -> AppResult<Vec<MileageReading>> {
        let rows = sqlx::query_as::<_, MileageReadingRow>(&format!(
            r#"
            SELECT {} FROM mileage_readings
            WHERE vehicle_id = $1 AND discarded_at IS NULL
            ORDER BY input_date ASC, id ASC
            "#,
            READING_COLUMNS
        ))
        .bind(vehicle_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Self::reading_rows(rows)
    }

    async fn latest_kept_reading(&mut self, vehicle_id: i64) -> AppResult<Option<MileageReading>> {
        let row = sqlx::query_as::<_, MileageReadingRow>(&format!(
            r#"
            SELECT {} FROM mileage_readings
            WHERE vehicle_id = $1 AND discarded_at IS NULL
            ORDER BY input_date DESC, id DESC
            LIMIT 1
            "#,
            READING_COLUMNS
        ))
        .bind(vehicle_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(MileageReading::try_from).transpose()
    }

    async fn kept_maintenances(&mut self, vehicle_id: Option<i64>) -> AppResult<Vec<MaintenanceEvent>> {
        let maintenances = sqlx::query_as::<_, MaintenanceEvent>(
            r#"
            SELECT * FROM maintenance_events
            WHERE discarded_at IS NULL AND ($1::BIGINT IS NULL OR vehicle_id = $1)
            ORDER BY id ASC
            "#,
        )
        .bind(vehicle_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(maintenances)
    }

    async fn insert_company(&mut self, request: &CreateCompanyRequest) -> AppResult<Company> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name, tax_id, max_daily_km, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.tax_id)
        .bind(request.max_daily_km)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(company)
    }

    async fn insert_vehicle(
        &mut self,
        company_id: i64,
        request: &CreateVehicleRequest,
    ) -> AppResult<Vehicle> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (company_id, license_plate, vin, current_mileage, created_at, updated_at)
            VALUES ($1, $2, $3, 0, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(&request.license_plate)
        .bind(&request.vin)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(vehicle)
    }

    async fn insert_reading(&mut self, reading: &NewMileageReading) -> AppResult<MileageReading> {
        let (record_type, record_id) = reading.source_record.to_columns();
        let row = sqlx::query_as::<_, MileageReadingRow>(&format!(
            r#"
            INSERT INTO mileage_readings
                (vehicle_id, company_id, input_date, source, source_record_type, source_record_id,
                 km_reported, status, conflict_reasons, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'original', '{{}}', NOW(), NOW())
            RETURNING {}
            "#,
            READING_COLUMNS
        ))
        .bind(reading.vehicle_id)
        .bind(reading.company_id)
        .bind(reading.input_date)
        .bind(reading.source)
        .bind(record_type)
        .bind(record_id)
        .bind(reading.km_reported)
        .fetch_one(&mut *self.tx)
        .await?;

        MileageReading::try_from(row)
    }

    async fn insert_maintenance(
        &mut self,
        maintenance: &NewMaintenanceEvent,
    ) -> AppResult<MaintenanceEvent> {
        let stored = sqlx::query_as::<_, MaintenanceEvent>(
            r#"
            INSERT INTO maintenance_events
                (vehicle_id, company_id, maintenance_date, register_km, amount, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(maintenance.vehicle_id)
        .bind(maintenance.company_id)
        .bind(maintenance.maintenance_date)
        .bind(maintenance.register_km)
        .bind(maintenance.amount)
        .bind(&maintenance.description)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(stored)
    }

    async fn update_reading(&mut self, reading: &MileageReading) -> AppResult<()> {
        let (record_type, record_id) = reading.source_record.to_columns();
        let result = sqlx::query(
            r#"
            UPDATE mileage_readings
            SET input_date = $2, source = $3, source_record_type = $4, source_record_id = $5,
                km_reported = $6, km_normalized = $7, status = $8, correction_notes = $9,
                conflict_reasons = $10, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(reading.id)
        .bind(reading.input_date)
        .bind(reading.source)
        .bind(record_type)
        .bind(record_id)
        .bind(reading.km_reported)
        .bind(reading.km_normalized)
        .bind(reading.status)
        .bind(&reading.correction_notes)
        .bind(&reading.conflict_reasons)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("MileageReading #{} no existe", reading.id)));
        }
        Ok(())
    }

    async fn update_vehicle(&mut self, vehicle: &Vehicle) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE vehicles
            SET company_id = $2, license_plate = $3, vin = $4, current_mileage = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(vehicle.id)
        .bind(vehicle.company_id)
        .bind(&vehicle.license_plate)
        .bind(&vehicle.vin)
        .bind(vehicle.current_mileage)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Vehicle #{} no existe", vehicle.id)));
        }
        Ok(())
    }

    async fn update_maintenance(&mut self, maintenance: &MaintenanceEvent) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE maintenance_events
            SET vehicle_id = $2, company_id = $3, maintenance_date = $4, register_km = $5,
                amount = $6, description = $7, reading_id = $8, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(maintenance.id)
        .bind(maintenance.vehicle_id)
        .bind(maintenance.company_id)
        .bind(maintenance.maintenance_date)
        .bind(maintenance.register_km)
        .bind(maintenance.amount)
        .bind(&maintenance.description)
        .bind(maintenance.reading_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "MaintenanceEvent #{} no existe",
                maintenance.id
            )));
        }
        Ok(())
    }

    async fn update_vehicle_mileage(&mut self, vehicle_id: i64, current_mileage: i64) -> AppResult<()> {
        sqlx::query("UPDATE vehicles SET current_mileage = $2, updated_at = NOW() WHERE id = $1")
            .bind(vehicle_id)
            .bind(current_mileage)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn related_ids(
        &mut self,
        kind: EntityKind,
        key: ForeignKey,
        parent_id: i64,
        scope: RecordScope,
    ) -> AppResult<Vec<i64>> {
        let condition = Self::key_condition(kind, key)?;
        let scope_condition = match scope {
            RecordScope::Kept => "discarded_at IS NULL",
            RecordScope::Discarded => "discarded_at IS NOT NULL",
            RecordScope::DiscardedAt(_) => "discarded_at = $2",
        };
        let sql = format!(
            "SELECT id FROM {} WHERE {} AND {} ORDER BY id ASC",
            kind.table(),
            condition,
            scope_condition
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(parent_id);
        if let RecordScope::DiscardedAt(at) = scope {
            query = query.bind(at);
        }

        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn set_discarded(
        &mut self,
        record: RecordRef,
        at: Option<DateTime<Utc>>,
        by: Option<Uuid>,
    ) -> AppResult<()> {
        let result = if record.kind == EntityKind::MileageReading {
            sqlx::query(
                "UPDATE mileage_readings SET discarded_at = $2, discarded_by = $3, updated_at = NOW() WHERE id = $1",
            )
            .bind(record.id)
            .bind(at)
            .bind(at.and(by))
            .execute(&mut *self.tx)
            .await?
        } else {
            sqlx::query(&format!(
                "UPDATE {} SET discarded_at = $2, updated_at = NOW() WHERE id = $1",
                record.kind.table()
            ))
            .bind(record.id)
            .bind(at)
            .execute(&mut *self.tx)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} no existe", record)));
        }
        Ok(())
    }

    async fn nullify(&mut self, kind: EntityKind, key: ForeignKey, parent_id: i64) -> AppResult<u64> {
        let sql = match (kind, key) {
            (EntityKind::MaintenanceEvent, ForeignKey::ReadingId) => {
                "UPDATE maintenance_events SET reading_id = NULL, updated_at = NOW() \
                 WHERE reading_id = $1 AND discarded_at IS NULL"
                    .to_string()
            }
            (EntityKind::MileageReading, ForeignKey::SourceMaintenance) => format!(
                "UPDATE mileage_readings SET source_record_type = NULL, source_record_id = NULL, \
                 updated_at = NOW() WHERE source_record_type = '{}' AND source_record_id = $1 \
                 AND discarded_at IS NULL",
                SourceRecord::MAINTENANCE_EVENT_TYPE
            ),
            (kind, key) => {
                return Err(AppError::Internal(format!(
                    "La clave {} de {} no admite NULL",
                    key.column(),
                    kind
                )))
            }
        };

        let result = sqlx::query(&sql)
            .bind(parent_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_unique_collision(
        &mut self,
        kind: EntityKind,
        field: UniqueField,
        value: &str,
        scope: Option<(ForeignKey, i64)>,
        exclude_id: i64,
    ) -> AppResult<Option<i64>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT id FROM {} WHERE discarded_at IS NULL AND {} = ",
            kind.table(),
            field.column()
        ));
        builder.push_bind(value.to_string());
        builder.push(" AND id <> ");
        builder.push_bind(exclude_id);
        if let Some((key, scope_id)) = scope {
            builder.push(format!(" AND {} = ", key.column()));
            builder.push_bind(scope_id);
        }
        builder.push(" ORDER BY id ASC LIMIT 1");

        let collision = builder
            .build_query_scalar::<i64>()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(collision)
    }

    async fn insert_audit_entry(&mut self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        let stored = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            INSERT INTO soft_delete_audit_logs
                (id, record_type, record_id, actor_id, action, context, cascade_count,
                 nullify_count, restored_count, can_restore, restore_complexity, performed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.record.kind)
        .bind(entry.record.id)
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(&entry.context)
        .bind(entry.cascade_count)
        .bind(entry.nullify_count)
        .bind(entry.restored_count)
        .bind(entry.can_restore)
        .bind(entry.restore_complexity)
        .bind(entry.performed_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(stored)
    }

    async fn query_audit_log(&mut self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLogEntry>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM soft_delete_audit_logs WHERE TRUE");

        if let Some(record_type) = filter.record_type {
            builder.push(" AND record_type = ").push_bind(record_type);
        }
        if let Some(record_id) = filter.record_id {
            builder.push(" AND record_id = ").push_bind(record_id);
        }
        if let Some(action) = filter.action {
            builder.push(" AND action = ").push_bind(action);
        }
        if let Some(from) = filter.from {
            builder.push(" AND performed_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND performed_at <= ").push_bind(to);
        }
        if let Some(actor_id) = filter.actor_id {
            builder.push(" AND actor_id = ").push_bind(actor_id);
        }
        if filter.with_cascades {
            builder.push(" AND cascade_count > 0");
        }

        builder
            .push(" ORDER BY performed_at DESC LIMIT ")
            .push_bind(filter.effective_limit())
            .push(" OFFSET ")
            .push_bind(filter.effective_offset());

        let entries = builder
            .build_query_as::<AuditLogEntry>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(entries)
    }

    async fn savepoint(&mut self, name: &'static str) -> AppResult<()> {
        sqlx::query(&format!("SAVEPOINT {}", name))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> AppResult<()> {
        sqlx::query(&format!("ROLLBACK TO SAVEPOINT {}", name))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &'static str) -> AppResult<()> {
        sqlx::query(&format!("RELEASE SAVEPOINT {}", name))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        if self.read_only {
            self.tx.rollback().await?;
        } else {
            self.tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_condition_for_source_record() {
        let condition =
            PgFleetTx::key_condition(EntityKind::MileageReading, ForeignKey::SourceMaintenance)
                .unwrap();
        assert_eq!(
            condition,
            "source_record_type = 'maintenance_event' AND source_record_id = $1"
        );
    }

    #[test]
    fn test_key_condition_rejects_unknown_pairs() {
        assert!(PgFleetTx::key_condition(EntityKind::Company, ForeignKey::VehicleId).is_err());
        assert_eq!(
            PgFleetTx::key_condition(EntityKind::Vehicle, ForeignKey::CompanyId).unwrap(),
            "company_id = $1"
        );
    }
}
