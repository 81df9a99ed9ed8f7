use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use crate::controllers::reading_controller::ReadingController;
use crate::dto::api_response::ApiResponse;
use serde::Deserialize;

use crate::dto::reading_dto::{MaintenanceResponse, MaintenanceSyncResponse, ReadingMutationResponse};
use crate::models::{
    CreateMaintenanceRequest, CreateReadingRequest, MaintenanceAlertType, UpdateMaintenanceRequest,
    UpdateReadingRequest,
};
use crate::services::{ConflictReport, CorrectionResult, CorrelationReport, MaintenanceAlerts};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_reading_router() -> Router<AppState> {
    Router::new()
        .route("/vehicles/:id/readings", post(create_reading))
        .route("/vehicles/:id/maintenance", post(create_maintenance))
        .route("/maintenance/alerts", get(get_maintenance_alerts))
        .route("/maintenance/:id", put(update_maintenance))
        .route("/maintenance/:id/sync-km", post(sync_maintenance_km))
        .route("/readings/:id", put(update_reading))
        .route("/readings/:id/conflicts", get(get_conflicts))
        .route("/readings/:id/correlation", get(get_correlation))
        .route("/readings/:id/correction", get(get_correction))
}

async fn create_reading(
    State(state): State<AppState>,
    Path(vehicle_id): Path<i64>,
    Json(request): Json<CreateReadingRequest>,
) -> Result<Json<ApiResponse<ReadingMutationResponse>>, AppError> {
    let controller = ReadingController::new(&state);
    let response = controller.create(vehicle_id, request).await?;
    Ok(Json(response))
}

async fn update_reading(
    State(state): State<AppState>,
    Path(reading_id): Path<i64>,
    Json(request): Json<UpdateReadingRequest>,
) -> Result<Json<ApiResponse<ReadingMutationResponse>>, AppError> {
    let controller = ReadingController::new(&state);
    let response = controller.update(reading_id, request).await?;
    Ok(Json(response))
}

async fn get_conflicts(
    State(state): State<AppState>,
    Path(reading_id): Path<i64>,
) -> Result<Json<ApiResponse<ConflictReport>>, AppError> {
    let controller = ReadingController::new(&state);
    Ok(Json(controller.conflicts(reading_id).await?))
}

async fn get_correlation(
    State(state): State<AppState>,
    Path(reading_id): Path<i64>,
) -> Result<Json<ApiResponse<CorrelationReport>>, AppError> {
    let controller = ReadingController::new(&state);
    Ok(Json(controller.correlation(reading_id).await?))
}

async fn get_correction(
    State(state): State<AppState>,
    Path(reading_id): Path<i64>,
) -> Result<Json<ApiResponse<CorrectionResult>>, AppError> {
    let controller = ReadingController::new(&state);
    Ok(Json(controller.correction(reading_id).await?))
}

async fn create_maintenance(
    State(state): State<AppState>,
    Path(vehicle_id): Path<i64>,
    Json(request): Json<CreateMaintenanceRequest>,
) -> Result<Json<ApiResponse<MaintenanceResponse>>, AppError> {
    let controller = ReadingController::new(&state);
    let response = controller.create_maintenance(vehicle_id, request).await?;
    Ok(Json(response))
}

async fn update_maintenance(
    State(state): State<AppState>,
    Path(maintenance_id): Path<i64>,
    Json(request): Json<UpdateMaintenanceRequest>,
) -> Result<Json<ApiResponse<MaintenanceResponse>>, AppError> {
    let controller = ReadingController::new(&state);
    let response = controller.update_maintenance(maintenance_id, request).await?;
    Ok(Json(response))
}

async fn sync_maintenance_km(
    State(state): State<AppState>,
    Path(maintenance_id): Path<i64>,
) -> Result<Json<ApiResponse<MaintenanceSyncResponse>>, AppError> {
    let controller = ReadingController::new(&state);
    Ok(Json(controller.sync_maintenance_km(maintenance_id).await?))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    vehicle_id: Option<i64>,
    alert_type: Option<MaintenanceAlertType>,
}

async fn get_maintenance_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<ApiResponse<MaintenanceAlerts>>, AppError> {
    let controller = ReadingController::new(&state);
    Ok(Json(controller.maintenance_alerts(query.vehicle_id, query.alert_type).await?))
}
