//! Servicio de registros de km
//!
//! Alta, edición manual y borrado de lecturas. Cada mutación revalida la
//! ventana del registro y recalcula el km del vehículo en la misma transacción.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::config::ReconciliationConfig;
use crate::models::{
    CreateReadingRequest, EntityKind, MileageReading, NewMileageReading, ReadingStatus, RecordRef,
    SourceRecord, UpdateReadingRequest, Vehicle,
};
use crate::repositories::{FleetStore, FleetTx};
use crate::services::conflict_detector_service::ConflictReport;
use crate::services::correlation_check_service::{CorrelationChecker, CorrelationReport};
use crate::services::km_correction_service::CorrectionResult;
use crate::services::revalidation_service::{RevalidationOutcome, RevalidationService};
use crate::services::soft_delete::{DeletionCoordinator, DeletionOptions, DeletionResult};
use crate::utils::errors::{bad_request_error, AppError, AppResult};

/// Lectura tras una mutación, con lo que cambió en su ventana
#[derive(Debug, Clone, Serialize)]
pub struct ReadingMutation {
    pub reading: MileageReading,
    pub revalidation: RevalidationOutcome,
    /// Solo orientativo; el veredicto lo da el detector de ventana
    pub correlation: CorrelationReport,
}

pub struct ReadingService {
    store: Arc<dyn FleetStore>,
    revalidation: RevalidationService,
    correlation: CorrelationChecker,
    deletion: DeletionCoordinator,
}

impl ReadingService {
    pub fn new(store: Arc<dyn FleetStore>, config: &ReconciliationConfig) -> Self {
        Self {
            revalidation: RevalidationService::new(config),
            correlation: CorrelationChecker::new(config),
            deletion: DeletionCoordinator::new(store.clone(), config),
            store,
        }
    }

    pub async fn create_reading(&self, vehicle_id: i64, request: CreateReadingRequest) -> AppResult<ReadingMutation> {
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let result: AppResult<ReadingMutation> = async {
            let vehicle = kept_vehicle(tx.as_mut(), vehicle_id).await?;
            let reading = NewMileageReading {
                vehicle_id: vehicle.id,
                company_id: vehicle.company_id,
                input_date: request.input_date,
                source: request.source,
                source_record: SourceRecord::None,
                km_reported: request.km_reported,
            };
            self.create_in_tx(tx.as_mut(), &reading).await
        }
        .await;

        finish(tx, result).await.map(|mutation| {
            log::info!(
                "📍 Registro de km {} creado para el vehículo {} ({} km, {})",
                mutation.reading.id,
                vehicle_id,
                mutation.reading.km_reported,
                mutation.reading.status.as_str()
            );
            mutation
        })
    }

    /// Inserta y revalida dentro de una transacción ya abierta
    pub async fn create_in_tx(&self, tx: &mut dyn FleetTx, reading: &NewMileageReading) -> AppResult<ReadingMutation> {
        if reading.km_reported < 0 {
            return Err(bad_request_error("El kilometraje no puede ser negativo"));
        }

        let inserted = tx.insert_reading(reading).await?;
        let mutation = self.settle_in_tx(tx, &inserted, None).await?;
        if mutation.correlation.has_conflict {
            log::debug!(
                "🔎 Chequeo de correlación con {} avisos para el registro {}",
                mutation.correlation.conflicts.len(),
                mutation.reading.id
            );
        }
        Ok(mutation)
    }

    /// Edición manual: el valor indicado pasa a ser el normalizado y el
    /// registro queda como `edited`, fuera de la corrección automática.
    pub async fn update_reading(&self, reading_id: i64, request: UpdateReadingRequest) -> AppResult<ReadingMutation> {
        request.validate()?;
        if request.km_normalized.is_none() && request.km_reported.is_none() && request.input_date.is_none() {
            return Err(bad_request_error("No hay cambios que aplicar"));
        }

        let mut tx = self.store.begin().await?;
        let result = self.update_in_tx(tx.as_mut(), reading_id, &request).await;

        finish(tx, result).await.map(|mutation| {
            log::info!("✏️ Registro de km {} editado manualmente", reading_id);
            mutation
        })
    }

    pub async fn update_in_tx(
        &self,
        tx: &mut dyn FleetTx,
        reading_id: i64,
        request: &UpdateReadingRequest,
    ) -> AppResult<ReadingMutation> {
        let current = tx
            .find_reading(reading_id)
            .await?
            .filter(|r| r.is_kept())
            .ok_or_else(|| AppError::NotFound("Registro de km no encontrado".to_string()))?;

        let mut edited = current.clone();
        if let Some(km_reported) = request.km_reported {
            edited.km_reported = km_reported;
        }
        if let Some(input_date) = request.input_date {
            edited.input_date = input_date;
        }
        edited.km_normalized = Some(request.km_normalized.unwrap_or(edited.km_reported));
        edited.status = ReadingStatus::Edited;
        edited.conflict_reasons.clear();
        edited.correction_notes = Some(format!("Editado manualmente. KM anterior: {}", current.effective_km()));
        tx.update_reading(&edited).await?;

        if current.input_date != edited.input_date {
            // En la fecha anterior el registro ya no existe: esa ventana se
            // arma sin él, igual que tras un borrado
            let departed = MileageReading {
                discarded_at: Some(tx.now()),
                ..current.clone()
            };
            self.revalidation.revalidate(tx, &departed, Some(current.id)).await?;
        }

        self.settle_in_tx(tx, &edited, Some(edited.id)).await
    }

    /// Revalida la ventana de `reading`, recalcula el km del vehículo y
    /// devuelve la lectura recargada con su chequeo de correlación
    pub async fn settle_in_tx(
        &self,
        tx: &mut dyn FleetTx,
        reading: &MileageReading,
        protected: Option<i64>,
    ) -> AppResult<ReadingMutation> {
        let revalidation = self.revalidation.revalidate(tx, reading, protected).await?;
        self.revalidation.refresh_vehicle_mileage(tx, reading.vehicle_id).await;

        let reading = reload(tx, reading.id).await?;
        let correlation = self.correlation.check(tx, &reading).await?;
        Ok(ReadingMutation {
            reading,
            revalidation,
            correlation,
        })
    }

    /// Borrado lógico a través del coordinador (con hooks y auditoría)
    pub async fn delete_reading(&self, reading_id: i64, actor_id: Option<Uuid>, force: bool) -> AppResult<DeletionResult> {
        let options = DeletionOptions {
            force,
            actor_id,
            ..DeletionOptions::default()
        };
        self.deletion
            .execute(RecordRef::new(EntityKind::MileageReading, reading_id), options)
            .await
    }

    pub async fn detect_conflicts(&self, reading_id: i64) -> AppResult<ConflictReport> {
        let mut tx = self.store.begin_read_only().await?;
        let result: AppResult<ConflictReport> = async {
            let reading = existing(tx.as_mut(), reading_id).await?;
            self.revalidation.detector().detect(tx.as_mut(), &reading).await
        }
        .await;
        tx.rollback().await?;
        result
    }

    pub async fn correlation_check(&self, reading_id: i64) -> AppResult<CorrelationReport> {
        let mut tx = self.store.begin_read_only().await?;
        let result: AppResult<CorrelationReport> = async {
            let reading = existing(tx.as_mut(), reading_id).await?;
            self.correlation.check(tx.as_mut(), &reading).await
        }
        .await;
        tx.rollback().await?;
        result
    }

    /// Corrección que se aplicaría hoy, sin escribirla
    pub async fn correct_reading(&self, reading_id: i64) -> AppResult<CorrectionResult> {
        let mut tx = self.store.begin_read_only().await?;
        let result: AppResult<CorrectionResult> = async {
            let reading = existing(tx.as_mut(), reading_id).await?;
            let report = self.revalidation.detector().detect(tx.as_mut(), &reading).await?;
            self.revalidation
                .corrector()
                .correct(tx.as_mut(), &reading, &report.conflictive_ids())
                .await
        }
        .await;
        tx.rollback().await?;
        result
    }
}

async fn kept_vehicle(tx: &mut dyn FleetTx, vehicle_id: i64) -> AppResult<Vehicle> {
    tx.find_vehicle(vehicle_id)
        .await?
        .filter(|v| v.is_kept())
        .ok_or_else(|| AppError::NotFound("Vehículo no encontrado".to_string()))
}

async fn existing(tx: &mut dyn FleetTx, reading_id: i64) -> AppResult<MileageReading> {
    tx.find_reading(reading_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Registro de km no encontrado".to_string()))
}

async fn reload(tx: &mut dyn FleetTx, reading_id: i64) -> AppResult<MileageReading> {
    tx.find_reading(reading_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("El registro de km {} desapareció durante la operación", reading_id)))
}

/// Confirma si todo fue bien; si no, revierte y devuelve el error original
pub(crate) async fn finish<T>(tx: Box<dyn FleetTx>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                log::error!("❌ Error revirtiendo la transacción: {}", rollback_error);
            }
            Err(e)
        }
    }
}
