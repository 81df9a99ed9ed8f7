//! Referencias genéricas de ciclo de vida
//!
//! Tipos compartidos por el borrado lógico y la restauración: el tipo de
//! entidad, la referencia (tipo, id), las claves foráneas que recorren las
//! políticas y el registro cargado de cualquiera de las cuatro tablas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use std::str::FromStr;

use super::company::Company;
use super::maintenance::MaintenanceEvent;
use super::mileage_reading::MileageReading;
use super::vehicle::Vehicle;
use crate::utils::errors::AppError;

/// Tipo de entidad con ciclo de vida gestionado
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Vehicle,
    MileageReading,
    MaintenanceEvent,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Company => "company",
            EntityKind::Vehicle => "vehicle",
            EntityKind::MileageReading => "mileage_reading",
            EntityKind::MaintenanceEvent => "maintenance_event",
        }
    }

    /// Nombre legible para mensajes
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Company => "Company",
            EntityKind::Vehicle => "Vehicle",
            EntityKind::MileageReading => "MileageReading",
            EntityKind::MaintenanceEvent => "MaintenanceEvent",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Company => "companies",
            EntityKind::Vehicle => "vehicles",
            EntityKind::MileageReading => "mileage_readings",
            EntityKind::MaintenanceEvent => "maintenance_events",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "company" | "companies" => Ok(EntityKind::Company),
            "vehicle" | "vehicles" => Ok(EntityKind::Vehicle),
            "mileage_reading" | "mileage_readings" | "vehicle_km" | "vehicle_kms" => {
                Ok(EntityKind::MileageReading)
            }
            "maintenance_event" | "maintenance_events" | "maintenance" | "maintenances" => {
                Ok(EntityKind::MaintenanceEvent)
            }
            other => Err(AppError::BadRequest(format!("Tipo de entidad desconocido: '{}'", other))),
        }
    }
}

/// Referencia (tipo, id) a cualquier registro con ciclo de vida
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl RecordRef {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Claves foráneas que pueden recorrer las políticas
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKey {
    CompanyId,
    VehicleId,
    /// maintenance_events.reading_id
    ReadingId,
    /// mileage_readings.source_record cuando apunta a un mantenimiento
    SourceMaintenance,
}

impl ForeignKey {
    pub fn column(&self) -> &'static str {
        match self {
            ForeignKey::CompanyId => "company_id",
            ForeignKey::VehicleId => "vehicle_id",
            ForeignKey::ReadingId => "reading_id",
            ForeignKey::SourceMaintenance => "source_record_id",
        }
    }
}

/// Campos con restricción de unicidad entre registros vigentes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UniqueField {
    CompanyName,
    LicensePlate,
}

impl UniqueField {
    pub fn column(&self) -> &'static str {
        match self {
            UniqueField::CompanyName => "name",
            UniqueField::LicensePlate => "license_plate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UniqueField::CompanyName => "Nombre",
            UniqueField::LicensePlate => "Matrícula",
        }
    }
}

/// Qué registros devuelve una consulta de relación
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    Kept,
    Discarded,
    /// Descartados exactamente en ese instante (mismo evento de borrado)
    DiscardedAt(DateTime<Utc>),
}

impl RecordScope {
    pub fn matches(&self, discarded_at: Option<DateTime<Utc>>) -> bool {
        match self {
            RecordScope::Kept => discarded_at.is_none(),
            RecordScope::Discarded => discarded_at.is_some(),
            RecordScope::DiscardedAt(at) => discarded_at == Some(*at),
        }
    }
}

/// Registro cargado de cualquiera de las tablas gestionadas
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LifecycleRecord {
    Company(Company),
    Vehicle(Vehicle),
    MileageReading(MileageReading),
    MaintenanceEvent(MaintenanceEvent),
}

impl LifecycleRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            LifecycleRecord::Company(_) => EntityKind::Company,
            LifecycleRecord::Vehicle(_) => EntityKind::Vehicle,
            LifecycleRecord::MileageReading(_) => EntityKind::MileageReading,
            LifecycleRecord::MaintenanceEvent(_) => EntityKind::MaintenanceEvent,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            LifecycleRecord::Company(c) => c.id,
            LifecycleRecord::Vehicle(v) => v.id,
            LifecycleRecord::MileageReading(r) => r.id,
            LifecycleRecord::MaintenanceEvent(m) => m.id,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.kind(), self.id())
    }

    pub fn discarded_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LifecycleRecord::Company(c) => c.discarded_at,
            LifecycleRecord::Vehicle(v) => v.discarded_at,
            LifecycleRecord::MileageReading(r) => r.discarded_at,
            LifecycleRecord::MaintenanceEvent(m) => m.discarded_at,
        }
    }

    pub fn is_kept(&self) -> bool {
        self.discarded_at().is_none()
    }

    /// Valor de una clave foránea propia del registro
    pub fn foreign_key(&self, key: ForeignKey) -> Option<i64> {
        match (self, key) {
            (LifecycleRecord::Vehicle(v), ForeignKey::CompanyId) => Some(v.company_id),
            (LifecycleRecord::MileageReading(r), ForeignKey::CompanyId) => Some(r.company_id),
            (LifecycleRecord::MileageReading(r), ForeignKey::VehicleId) => Some(r.vehicle_id),
            (LifecycleRecord::MileageReading(r), ForeignKey::SourceMaintenance) => {
                r.source_record.maintenance_event_id()
            }
            (LifecycleRecord::MaintenanceEvent(m), ForeignKey::CompanyId) => Some(m.company_id),
            (LifecycleRecord::MaintenanceEvent(m), ForeignKey::VehicleId) => Some(m.vehicle_id),
            (LifecycleRecord::MaintenanceEvent(m), ForeignKey::ReadingId) => m.reading_id,
            _ => None,
        }
    }

    /// Valor de un campo único
    pub fn unique_value(&self, field: UniqueField) -> Option<&str> {
        match (self, field) {
            (LifecycleRecord::Company(c), UniqueField::CompanyName) => Some(c.name.as_str()),
            (LifecycleRecord::Vehicle(v), UniqueField::LicensePlate) => Some(v.license_plate.as_str()),
            _ => None,
        }
    }

    /// Nombre corto para mensajes (nombre, matrícula, fecha...)
    pub fn display_name(&self) -> String {
        match self {
            LifecycleRecord::Company(c) => c.name.clone(),
            LifecycleRecord::Vehicle(v) => v.license_plate.clone(),
            LifecycleRecord::MileageReading(r) => {
                format!("{} km el {}", r.km_reported, r.input_date.format("%d/%m/%Y"))
            }
            LifecycleRecord::MaintenanceEvent(m) => {
                format!("mantenimiento del {}", m.maintenance_date.format("%d/%m/%Y"))
            }
        }
    }

    pub fn as_reading(&self) -> Option<&MileageReading> {
        match self {
            LifecycleRecord::MileageReading(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_maintenance(&self) -> Option<&MaintenanceEvent> {
        match self {
            LifecycleRecord::MaintenanceEvent(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_vehicle(&self) -> Option<&Vehicle> {
        match self {
            LifecycleRecord::Vehicle(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("vehicle".parse::<EntityKind>().unwrap(), EntityKind::Vehicle);
        assert_eq!("vehicle_kms".parse::<EntityKind>().unwrap(), EntityKind::MileageReading);
        assert_eq!("maintenance".parse::<EntityKind>().unwrap(), EntityKind::MaintenanceEvent);
        assert!("driver".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_scope_matching() {
        let at = Utc::now();
        assert!(RecordScope::Kept.matches(None));
        assert!(!RecordScope::Kept.matches(Some(at)));
        assert!(RecordScope::Discarded.matches(Some(at)));
        assert!(RecordScope::DiscardedAt(at).matches(Some(at)));
        assert!(!RecordScope::DiscardedAt(at).matches(Some(at + chrono::Duration::microseconds(1))));
    }
}
