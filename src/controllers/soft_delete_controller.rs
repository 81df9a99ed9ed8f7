use crate::dto::api_response::ApiResponse;
use crate::dto::soft_delete_dto::AuditLogResponse;
use crate::models::{AuditLogFilter, RecordRef};
use crate::services::soft_delete::{
    DeletionCoordinator, DeletionOptions, DeletionPreview, DeletionResult, RestorationCoordinator,
    RestorationOptions, RestorationPreview, RestorationResult,
};
use crate::services::AuditLogService;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct SoftDeleteController {
    deletion: DeletionCoordinator,
    restoration: RestorationCoordinator,
    audit: AuditLogService,
}

impl SoftDeleteController {
    pub fn new(state: &AppState) -> Self {
        Self {
            deletion: DeletionCoordinator::new(state.store.clone(), &state.reconciliation),
            restoration: RestorationCoordinator::new(state.store.clone(), &state.reconciliation),
            audit: AuditLogService::new(state.store.clone()),
        }
    }

    pub async fn deletion_preview(&self, record: RecordRef) -> Result<ApiResponse<DeletionPreview>, AppError> {
        let preview = self.deletion.preview(record).await?;
        let message = preview.message.clone();
        Ok(ApiResponse::success_with_message(preview, message))
    }

    pub async fn delete(
        &self,
        record: RecordRef,
        options: DeletionOptions,
    ) -> Result<ApiResponse<DeletionResult>, AppError> {
        let result = self.deletion.execute(record, options).await?;
        let message = result.message.clone();
        let warnings = result.warnings.clone();
        Ok(ApiResponse::success_with_message(result, message).with_warnings(warnings))
    }

    pub async fn restoration_preview(&self, record: RecordRef) -> Result<ApiResponse<RestorationPreview>, AppError> {
        let preview = self.restoration.preview(record).await?;
        let message = preview.message.clone();
        Ok(ApiResponse::success_with_message(preview, message))
    }

    pub async fn restore(
        &self,
        record: RecordRef,
        options: RestorationOptions,
    ) -> Result<ApiResponse<RestorationResult>, AppError> {
        let result = self.restoration.execute(record, options).await?;
        let message = result.message.clone();
        let warnings = result.warnings.clone();
        Ok(ApiResponse::success_with_message(result, message).with_warnings(warnings))
    }

    pub async fn audit_logs(&self, filter: AuditLogFilter) -> Result<ApiResponse<Vec<AuditLogResponse>>, AppError> {
        let entries = self.audit.query(&filter).await?;
        Ok(ApiResponse::success(
            entries.into_iter().map(AuditLogResponse::from).collect(),
        ))
    }
}
