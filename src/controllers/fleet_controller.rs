use crate::dto::api_response::ApiResponse;
use crate::dto::fleet_dto::{CompanyResponse, VehicleResponse};
use crate::models::{CreateCompanyRequest, CreateVehicleRequest};
use crate::services::FleetService;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct FleetController {
    service: FleetService,
}

impl FleetController {
    pub fn new(state: &AppState) -> Self {
        Self {
            service: FleetService::new(state.store.clone()),
        }
    }

    pub async fn create_company(
        &self,
        request: CreateCompanyRequest,
    ) -> Result<ApiResponse<CompanyResponse>, AppError> {
        let company = self.service.create_company(request).await?;
        Ok(ApiResponse::success_with_message(
            company.into(),
            "Compañía creada exitosamente".to_string(),
        ))
    }

    pub async fn create_vehicle(
        &self,
        company_id: i64,
        request: CreateVehicleRequest,
    ) -> Result<ApiResponse<VehicleResponse>, AppError> {
        let vehicle = self.service.create_vehicle(company_id, request).await?;
        Ok(ApiResponse::success_with_message(
            vehicle.into(),
            "Vehículo creado exitosamente".to_string(),
        ))
    }
}
