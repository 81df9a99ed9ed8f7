//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle y su request de creación.
//! El kilometraje actual es una caché del último registro de km vigente.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Vehicle principal - mapea exactamente a la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Vehicle {
    pub id: i64,
    pub company_id: i64,
    pub license_plate: String,
    pub vin: Option<String>,
    pub current_mileage: i64,
    pub discarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn is_kept(&self) -> bool {
        self.discarded_at.is_none()
    }
}

/// Request para crear un nuevo vehículo
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(
        length(min = 2, max = 20),
        custom = "crate::utils::validation::validate_license_plate"
    )]
    pub license_plate: String,

    #[validate(length(min = 11, max = 17))]
    pub vin: Option<String>,
}
