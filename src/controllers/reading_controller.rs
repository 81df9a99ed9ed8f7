use crate::dto::api_response::ApiResponse;
use crate::dto::reading_dto::{MaintenanceResponse, MaintenanceSyncResponse, ReadingMutationResponse};
use crate::models::{
    CreateMaintenanceRequest, CreateReadingRequest, MaintenanceAlertType, UpdateMaintenanceRequest,
    UpdateReadingRequest,
};
use crate::services::{
    ConflictReport, CorrectionResult, CorrelationReport, MaintenanceAlerts, MaintenanceService,
    ReadingService,
};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct ReadingController {
    readings: ReadingService,
    maintenance: MaintenanceService,
}

impl ReadingController {
    pub fn new(state: &AppState) -> Self {
        Self {
            readings: ReadingService::new(state.store.clone(), &state.reconciliation),
            maintenance: MaintenanceService::new(state.store.clone(), &state.reconciliation),
        }
    }

    pub async fn create(
        &self,
        vehicle_id: i64,
        request: CreateReadingRequest,
    ) -> Result<ApiResponse<ReadingMutationResponse>, AppError> {
        let mutation = self.readings.create_reading(vehicle_id, request).await?;
        Ok(ApiResponse::success_with_message(
            mutation.into(),
            "Registro de km creado exitosamente".to_string(),
        ))
    }

    pub async fn update(
        &self,
        reading_id: i64,
        request: UpdateReadingRequest,
    ) -> Result<ApiResponse<ReadingMutationResponse>, AppError> {
        let mutation = self.readings.update_reading(reading_id, request).await?;
        Ok(ApiResponse::success_with_message(
            mutation.into(),
            "Registro de km actualizado".to_string(),
        ))
    }

    pub async fn conflicts(&self, reading_id: i64) -> Result<ApiResponse<ConflictReport>, AppError> {
        Ok(ApiResponse::success(self.readings.detect_conflicts(reading_id).await?))
    }

    pub async fn correlation(&self, reading_id: i64) -> Result<ApiResponse<CorrelationReport>, AppError> {
        Ok(ApiResponse::success(self.readings.correlation_check(reading_id).await?))
    }

    pub async fn correction(&self, reading_id: i64) -> Result<ApiResponse<CorrectionResult>, AppError> {
        Ok(ApiResponse::success(self.readings.correct_reading(reading_id).await?))
    }

    pub async fn create_maintenance(
        &self,
        vehicle_id: i64,
        request: CreateMaintenanceRequest,
    ) -> Result<ApiResponse<MaintenanceResponse>, AppError> {
        let creation = self.maintenance.create_maintenance(vehicle_id, request).await?;
        let warnings = creation.warnings.clone();
        Ok(ApiResponse::success_with_message(
            creation.into(),
            "Mantenimiento creado exitosamente".to_string(),
        )
        .with_warnings(warnings))
    }

    pub async fn update_maintenance(
        &self,
        maintenance_id: i64,
        request: UpdateMaintenanceRequest,
    ) -> Result<ApiResponse<MaintenanceResponse>, AppError> {
        let change = self.maintenance.update_maintenance(maintenance_id, request).await?;
        let warnings = change.warnings.clone();
        Ok(ApiResponse::success_with_message(
            change.into(),
            "Mantenimiento actualizado".to_string(),
        )
        .with_warnings(warnings))
    }

    pub async fn sync_maintenance_km(
        &self,
        maintenance_id: i64,
    ) -> Result<ApiResponse<MaintenanceSyncResponse>, AppError> {
        let sync = self.maintenance.sync_km(maintenance_id).await?;
        let message = sync.message.clone();
        Ok(ApiResponse::success_with_message(sync.into(), message))
    }

    pub async fn maintenance_alerts(
        &self,
        vehicle_id: Option<i64>,
        alert_type: Option<MaintenanceAlertType>,
    ) -> Result<ApiResponse<MaintenanceAlerts>, AppError> {
        Ok(ApiResponse::success(self.maintenance.alerts(vehicle_id, alert_type).await?))
    }
}
