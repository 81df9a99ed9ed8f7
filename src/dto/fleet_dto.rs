use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Company, Vehicle};

// Response de compañía
#[derive(Debug, Serialize)]
pub struct CompanyResponse {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    pub max_daily_km: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Company> for CompanyResponse {
    fn from(company: Company) -> Self {
        Self {
            id: company.id,
            name: company.name,
            tax_id: company.tax_id,
            max_daily_km: company.max_daily_km,
            created_at: company.created_at,
        }
    }
}

// Response de vehículo
#[derive(Debug, Serialize)]
pub struct VehicleResponse {
    pub id: i64,
    pub company_id: i64,
    pub license_plate: String,
    pub vin: Option<String>,
    pub current_mileage: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id,
            company_id: vehicle.company_id,
            license_plate: vehicle.license_plate,
            vin: vehicle.vin,
            current_mileage: vehicle.current_mileage,
            created_at: vehicle.created_at,
        }
    }
}
