//! Modelo de MaintenanceEvent
//!
//! Un mantenimiento puede haber creado un registro de km; el vínculo es débil
//! (`reading_id`) y nunca implica propiedad.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::MileageReading;

/// MaintenanceEvent principal - mapea a la tabla maintenance_events
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MaintenanceEvent {
    pub id: i64,
    pub vehicle_id: i64,
    pub company_id: i64,
    pub maintenance_date: NaiveDate,
    pub register_km: i64,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub reading_id: Option<i64>,
    pub discarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceEvent {
    pub fn is_kept(&self) -> bool {
        self.discarded_at.is_none()
    }
}

/// Datos para insertar un mantenimiento
#[derive(Debug, Clone)]
pub struct NewMaintenanceEvent {
    pub vehicle_id: i64,
    pub company_id: i64,
    pub maintenance_date: NaiveDate,
    pub register_km: i64,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

/// Request para crear un mantenimiento
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMaintenanceRequest {
    pub maintenance_date: NaiveDate,

    #[validate(range(min = 0))]
    pub register_km: i64,

    pub amount: Option<Decimal>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    /// Crear también el registro de km vinculado
    #[serde(default)]
    pub create_km_record: bool,
}

/// Request para editar un mantenimiento. Los flags deciden qué pasa con su
/// registro de km: crearlo si no tiene o arrastrar el km nuevo al existente.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMaintenanceRequest {
    pub maintenance_date: Option<NaiveDate>,

    #[validate(range(min = 0))]
    pub register_km: Option<i64>,

    pub amount: Option<Decimal>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default)]
    pub update_km_record: bool,

    #[serde(default)]
    pub create_km_record: bool,
}

impl UpdateMaintenanceRequest {
    pub fn is_empty(&self) -> bool {
        self.maintenance_date.is_none()
            && self.register_km.is_none()
            && self.amount.is_none()
            && self.description.is_none()
            && !self.update_km_record
            && !self.create_km_record
    }
}

/// Situación del registro de km de un mantenimiento
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceKmStatus {
    Active,
    Deleted,
    NoRecord,
}

/// Filtro de alertas de mantenimientos
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAlertType {
    Deleted,
    NoRecord,
    Desynchronized,
    Conflictive,
}

impl MaintenanceEvent {
    /// El km o la fecha del mantenimiento ya no coinciden con su registro
    pub fn is_desynchronized_with(&self, reading: &MileageReading) -> bool {
        self.register_km != reading.effective_km() || self.maintenance_date != reading.input_date
    }
}
