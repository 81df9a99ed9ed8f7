//! Alta de compañías y vehículos
//!
//! Las claves únicas (nombre de compañía, matrícula por compañía) solo se
//! comparan contra registros vigentes, igual que al restaurar.

use std::sync::Arc;
use validator::Validate;

use crate::models::{
    Company, CreateCompanyRequest, CreateVehicleRequest, EntityKind, ForeignKey, UniqueField, Vehicle,
};
use crate::repositories::FleetStore;
use crate::services::reading_service::finish;
use crate::utils::errors::{conflict_error, AppError, AppResult};

pub struct FleetService {
    store: Arc<dyn FleetStore>,
}

impl FleetService {
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    pub async fn create_company(&self, request: CreateCompanyRequest) -> AppResult<Company> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let result: AppResult<Company> = async {
            let name = request.name.as_str();
            if tx
                .find_unique_collision(EntityKind::Company, UniqueField::CompanyName, name, None, 0)
                .await?
                .is_some()
            {
                return Err(conflict_error("Company", "name", name));
            }
            tx.insert_company(&request).await
        }
        .await;

        let company = finish(tx, result).await?;
        log::info!("🏢 Compañía {} creada: {}", company.id, company.name);
        Ok(company)
    }

    pub async fn create_vehicle(&self, company_id: i64, request: CreateVehicleRequest) -> AppResult<Vehicle> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let result: AppResult<Vehicle> = async {
            tx.find_company(company_id)
                .await?
                .filter(|c| c.is_kept())
                .ok_or_else(|| AppError::NotFound("Compañía no encontrada".to_string()))?;

            let plate = request.license_plate.as_str();
            if tx
                .find_unique_collision(
                    EntityKind::Vehicle,
                    UniqueField::LicensePlate,
                    plate,
                    Some((ForeignKey::CompanyId, company_id)),
                    0,
                )
                .await?
                .is_some()
            {
                return Err(conflict_error("Vehicle", "license_plate", plate));
            }
            tx.insert_vehicle(company_id, &request).await
        }
        .await;

        let vehicle = finish(tx, result).await?;
        log::info!("🚗 Vehículo {} creado: {}", vehicle.id, vehicle.license_plate);
        Ok(vehicle)
    }
}
