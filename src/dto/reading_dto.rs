use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{MaintenanceEvent, MileageReading, ReadingSource, ReadingStatus, SourceRecord};
use crate::services::correlation_check_service::CorrelationConflict;
use crate::services::{MaintenanceChange, MaintenanceSync, ReadingMutation, SyncAction};

// Response de registro de km
#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    pub id: i64,
    pub vehicle_id: i64,
    pub input_date: NaiveDate,
    pub source: ReadingSource,
    pub source_record: SourceRecord,
    pub km_reported: i64,
    pub km_normalized: Option<i64>,
    pub effective_km: i64,
    pub status: ReadingStatus,
    pub correction_notes: Option<String>,
    pub conflict_reasons: Vec<String>,
}

impl From<&MileageReading> for ReadingResponse {
    fn from(reading: &MileageReading) -> Self {
        Self {
            id: reading.id,
            vehicle_id: reading.vehicle_id,
            input_date: reading.input_date,
            source: reading.source,
            source_record: reading.source_record,
            km_reported: reading.km_reported,
            km_normalized: reading.km_normalized,
            effective_km: reading.effective_km(),
            status: reading.status,
            correction_notes: reading.correction_notes.clone(),
            conflict_reasons: reading.conflict_reasons.clone(),
        }
    }
}

// Registro creado/editado con el efecto sobre su ventana
#[derive(Debug, Serialize)]
pub struct ReadingMutationResponse {
    pub reading: ReadingResponse,
    pub corrected: Vec<i64>,
    pub conflictive: Vec<i64>,
    pub reset: Vec<i64>,
    pub correlation_warnings: Vec<CorrelationConflict>,
}

impl From<ReadingMutation> for ReadingMutationResponse {
    fn from(mutation: ReadingMutation) -> Self {
        Self {
            reading: ReadingResponse::from(&mutation.reading),
            corrected: mutation.revalidation.corrected,
            conflictive: mutation.revalidation.conflictive,
            reset: mutation.revalidation.reset,
            correlation_warnings: mutation.correlation.conflicts,
        }
    }
}

// Response de mantenimiento
#[derive(Debug, Serialize)]
pub struct MaintenanceResponse {
    pub id: i64,
    pub vehicle_id: i64,
    pub maintenance_date: NaiveDate,
    pub register_km: i64,
    pub amount: Option<rust_decimal::Decimal>,
    pub description: Option<String>,
    pub reading_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub km_record: Option<ReadingMutationResponse>,
}

impl MaintenanceResponse {
    fn build(maintenance: MaintenanceEvent, km_record: Option<ReadingMutation>) -> Self {
        Self {
            id: maintenance.id,
            vehicle_id: maintenance.vehicle_id,
            maintenance_date: maintenance.maintenance_date,
            register_km: maintenance.register_km,
            amount: maintenance.amount,
            description: maintenance.description,
            reading_id: maintenance.reading_id,
            km_record: km_record.map(ReadingMutationResponse::from),
        }
    }
}

impl From<MaintenanceChange> for MaintenanceResponse {
    fn from(change: MaintenanceChange) -> Self {
        Self::build(change.maintenance, change.km_record)
    }
}

// Resultado de sincronizar el km de un mantenimiento
#[derive(Debug, Serialize)]
pub struct MaintenanceSyncResponse {
    pub action: SyncAction,
    pub message: String,
    pub maintenance: MaintenanceResponse,
}

impl From<MaintenanceSync> for MaintenanceSyncResponse {
    fn from(sync: MaintenanceSync) -> Self {
        Self {
            action: sync.action,
            message: sync.message,
            maintenance: MaintenanceResponse::build(sync.maintenance, sync.km_record),
        }
    }
}
