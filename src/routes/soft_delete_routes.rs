use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use crate::controllers::soft_delete_controller::SoftDeleteController;
use crate::dto::api_response::ApiResponse;
use crate::dto::soft_delete_dto::AuditLogResponse;
use crate::models::{AuditLogFilter, EntityKind, RecordRef};
use crate::services::soft_delete::{
    DeletionOptions, DeletionPreview, DeletionResult, RestorationOptions, RestorationPreview,
    RestorationResult,
};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_soft_delete_router() -> Router<AppState> {
    Router::new()
        .route("/audit-logs", get(get_audit_logs))
        .route("/:entity/:id/deletion-preview", get(deletion_preview))
        .route("/:entity/:id/delete", post(delete_record))
        .route("/:entity/:id/restoration-preview", get(restoration_preview))
        .route("/:entity/:id/restore", post(restore_record))
}

/// `entity` admite singular o plural (`vehicle`, `vehicles`, `vehicle_kms`...)
fn record_ref(entity: &str, id: i64) -> Result<RecordRef, AppError> {
    let kind: EntityKind = entity.parse()?;
    Ok(RecordRef::new(kind, id))
}

async fn deletion_preview(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, i64)>,
) -> Result<Json<ApiResponse<DeletionPreview>>, AppError> {
    let controller = SoftDeleteController::new(&state);
    Ok(Json(controller.deletion_preview(record_ref(&entity, id)?).await?))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, i64)>,
    Json(options): Json<DeletionOptions>,
) -> Result<Json<ApiResponse<DeletionResult>>, AppError> {
    let controller = SoftDeleteController::new(&state);
    Ok(Json(controller.delete(record_ref(&entity, id)?, options).await?))
}

async fn restoration_preview(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, i64)>,
) -> Result<Json<ApiResponse<RestorationPreview>>, AppError> {
    let controller = SoftDeleteController::new(&state);
    Ok(Json(controller.restoration_preview(record_ref(&entity, id)?).await?))
}

async fn restore_record(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, i64)>,
    Json(options): Json<RestorationOptions>,
) -> Result<Json<ApiResponse<RestorationResult>>, AppError> {
    let controller = SoftDeleteController::new(&state);
    Ok(Json(controller.restore(record_ref(&entity, id)?, options).await?))
}

async fn get_audit_logs(
    State(state): State<AppState>,
    Query(filter): Query<AuditLogFilter>,
) -> Result<Json<ApiResponse<Vec<AuditLogResponse>>>, AppError> {
    let controller = SoftDeleteController::new(&state);
    Ok(Json(controller.audit_logs(filter).await?))
}
