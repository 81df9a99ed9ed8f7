use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use crate::controllers::fleet_controller::FleetController;
use crate::dto::api_response::ApiResponse;
use crate::dto::fleet_dto::{CompanyResponse, VehicleResponse};
use crate::models::{CreateCompanyRequest, CreateVehicleRequest};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_fleet_router() -> Router<AppState> {
    Router::new()
        .route("/companies", post(create_company))
        .route("/companies/:id/vehicles", post(create_vehicle))
}

async fn create_company(
    State(state): State<AppState>,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<Json<ApiResponse<CompanyResponse>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.create_company(request).await?;
    Ok(Json(response))
}

async fn create_vehicle(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<Json<ApiResponse<VehicleResponse>>, AppError> {
    let controller = FleetController::new(&state);
    let response = controller.create_vehicle(company_id, request).await?;
    Ok(Json(response))
}
