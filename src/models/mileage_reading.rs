//! Modelo de MileageReading
//!
//! Lectura de odómetro de un vehículo. El valor efectivo es el normalizado si
//! existe, si no el reportado. El estado lo decide el protocolo de revalidación
//! de ventana o una edición manual.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

use crate::utils::errors::AppError;

/// Estado del registro de km - se guarda como texto
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    Original,
    Corrected,
    Edited,
    Conflictive,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Original => "original",
            ReadingStatus::Corrected => "corrected",
            ReadingStatus::Edited => "edited",
            ReadingStatus::Conflictive => "conflictive",
        }
    }
}

/// Origen de la lectura
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    Telemetry,
    Maintenance,
    Inspection,
    #[default]
    Manual,
    Other,
}

/// Registro que originó la lectura. En base de datos son dos columnas
/// (`source_record_type`, `source_record_id`); en memoria solo existe esta unión.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum SourceRecord {
    #[default]
    None,
    MaintenanceEvent(i64),
}

impl SourceRecord {
    pub const MAINTENANCE_EVENT_TYPE: &'static str = "maintenance_event";

    /// Reconstruye la referencia desde las columnas persistidas
    pub fn from_columns(record_type: Option<&str>, record_id: Option<i64>) -> Result<Self, AppError> {
        match (record_type, record_id) {
            (None, None) => Ok(SourceRecord::None),
            (Some(Self::MAINTENANCE_EVENT_TYPE), Some(id)) => Ok(SourceRecord::MaintenanceEvent(id)),
            (t, id) => Err(AppError::Internal(format!(
                "Referencia de origen inválida: tipo {:?}, id {:?}",
                t, id
            ))),
        }
    }

    /// Columnas (`source_record_type`, `source_record_id`) a persistir
    pub fn to_columns(&self) -> (Option<&'static str>, Option<i64>) {
        match self {
            SourceRecord::None => (None, None),
            SourceRecord::MaintenanceEvent(id) => (Some(Self::MAINTENANCE_EVENT_TYPE), Some(*id)),
        }
    }

    pub fn maintenance_event_id(&self) -> Option<i64> {
        match self {
            SourceRecord::MaintenanceEvent(id) => Some(*id),
            SourceRecord::None => None,
        }
    }
}

/// Clave de orden de la línea temporal: fecha y, a igual fecha, id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimelineKey {
    pub date: NaiveDate,
    pub id: i64,
}

impl TimelineKey {
    /// Clave anterior a cualquier lectura de esa fecha
    pub fn start_of(date: NaiveDate) -> Self {
        Self { date, id: i64::MIN }
    }

    /// Clave posterior a cualquier lectura de esa fecha
    pub fn end_of(date: NaiveDate) -> Self {
        Self { date, id: i64::MAX }
    }
}

/// MileageReading principal - mapea a la tabla mileage_readings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MileageReading {
    pub id: i64,
    pub vehicle_id: i64,
    pub company_id: i64,
    pub input_date: NaiveDate,
    pub source: ReadingSource,
    pub source_record: SourceRecord,
    pub km_reported: i64,
    pub km_normalized: Option<i64>,
    pub status: ReadingStatus,
    pub correction_notes: Option<String>,
    pub conflict_reasons: Vec<String>,
    pub discarded_at: Option<DateTime<Utc>>,
    pub discarded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MileageReading {
    /// KM efectivo: normalizado si existe, reportado si no
    pub fn effective_km(&self) -> i64 {
        self.km_normalized.unwrap_or(self.km_reported)
    }

    pub fn is_kept(&self) -> bool {
        self.discarded_at.is_none()
    }

    pub fn timeline_key(&self) -> TimelineKey {
        TimelineKey {
            date: self.input_date,
            id: self.id,
        }
    }

    pub fn from_maintenance(&self) -> bool {
        matches!(self.source_record, SourceRecord::MaintenanceEvent(_))
    }
}

/// Fila cruda de mileage_readings tal como la devuelve PostgreSQL
#[derive(Debug, FromRow)]
pub struct MileageReadingRow {
    pub id: i64,
    pub vehicle_id: i64,
    pub company_id: i64,
    pub input_date: NaiveDate,
    pub source: ReadingSource,
    pub source_record_type: Option<String>,
    pub source_record_id: Option<i64>,
    pub km_reported: i64,
    pub km_normalized: Option<i64>,
    pub status: ReadingStatus,
    pub correction_notes: Option<String>,
    pub conflict_reasons: Vec<String>,
    pub discarded_at: Option<DateTime<Utc>>,
    pub discarded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MileageReadingRow> for MileageReading {
    type Error = AppError;

    fn try_from(row: MileageReadingRow) -> Result<Self, Self::Error> {
        let source_record =
            SourceRecord::from_columns(row.source_record_type.as_deref(), row.source_record_id)?;

        Ok(Self {
            id: row.id,
            vehicle_id: row.vehicle_id,
            company_id: row.company_id,
            input_date: row.input_date,
            source: row.source,
            source_record,
            km_reported: row.km_reported,
            km_normalized: row.km_normalized,
            status: row.status,
            correction_notes: row.correction_notes,
            conflict_reasons: row.conflict_reasons,
            discarded_at: row.discarded_at,
            discarded_by: row.discarded_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Datos para insertar una lectura nueva
#[derive(Debug, Clone)]
pub struct NewMileageReading {
    pub vehicle_id: i64,
    pub company_id: i64,
    pub input_date: NaiveDate,
    pub source: ReadingSource,
    pub source_record: SourceRecord,
    pub km_reported: i64,
}

/// Request para crear un registro de km
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReadingRequest {
    pub input_date: NaiveDate,

    #[validate(range(min = 0))]
    pub km_reported: i64,

    #[serde(default)]
    pub source: ReadingSource,
}

/// Request para editar manualmente un registro de km
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateReadingRequest {
    /// Nuevo valor efectivo fijado por el usuario
    #[validate(range(min = 0))]
    pub km_normalized: Option<i64>,

    #[validate(range(min = 0))]
    pub km_reported: Option<i64>,

    pub input_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_record_columns() {
        let source = SourceRecord::MaintenanceEvent(9);
        let (record_type, record_id) = source.to_columns();
        assert_eq!(record_type, Some("maintenance_event"));
        assert_eq!(SourceRecord::from_columns(record_type, record_id).unwrap(), source);
        assert_eq!(SourceRecord::from_columns(None, None).unwrap(), SourceRecord::None);
    }

    #[test]
    fn test_source_record_rejects_dangling_columns() {
        assert!(SourceRecord::from_columns(Some("maintenance_event"), None).is_err());
        assert!(SourceRecord::from_columns(None, Some(3)).is_err());
        assert!(SourceRecord::from_columns(Some("invoice"), Some(3)).is_err());
    }

    #[test]
    fn test_timeline_key_orders_by_date_then_id() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(TimelineKey { date: d1, id: 50 } < TimelineKey { date: d2, id: 1 });
        assert!(TimelineKey { date: d1, id: 1 } < TimelineKey { date: d1, id: 2 });
        assert!(TimelineKey::start_of(d1) < TimelineKey { date: d1, id: 1 });
        assert!(TimelineKey::end_of(d1) < TimelineKey::start_of(d2));
    }
}
