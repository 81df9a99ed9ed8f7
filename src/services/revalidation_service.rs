//! Revalidación de la ventana de un registro de km
//!
//! Aplica el veredicto del detector: los válidos corregidos o conflictivos
//! vuelven a `original`; cada conflictivo se corrige si se puede y si no queda
//! marcado como `conflictive`. Solo se escriben filas que cambian, así que dos
//! pasadas seguidas sobre una ventana estable no modifican nada.

use serde::Serialize;

use crate::config::ReconciliationConfig;
use crate::models::{MileageReading, ReadingStatus};
use crate::repositories::FleetTx;
use crate::services::conflict_detector_service::{ConflictDetector, ConflictReport};
use crate::services::km_correction_service::KmCorrector;
use crate::utils::errors::AppResult;

/// Resultado de una pasada; las listas solo contienen filas reescritas
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevalidationOutcome {
    pub report: ConflictReport,
    pub corrected: Vec<i64>,
    pub conflictive: Vec<i64>,
    pub reset: Vec<i64>,
}

impl RevalidationOutcome {
    pub fn changed_count(&self) -> usize {
        self.corrected.len() + self.conflictive.len() + self.reset.len()
    }
}

#[derive(Debug, Clone)]
pub struct RevalidationService {
    detector: ConflictDetector,
    corrector: KmCorrector,
}

impl RevalidationService {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            detector: ConflictDetector::new(config),
            corrector: KmCorrector::new(config),
        }
    }

    pub fn detector(&self) -> &ConflictDetector {
        &self.detector
    }

    pub fn corrector(&self) -> &KmCorrector {
        &self.corrector
    }

    /// Revalida la ventana de `pivot`. `protected` (edición manual) no se toca
    /// aunque el detector lo considere conflictivo.
    pub async fn revalidate(
        &self,
        tx: &mut dyn FleetTx,
        pivot: &MileageReading,
        protected: Option<i64>,
    ) -> AppResult<RevalidationOutcome> {
        let report = self.detector.detect(tx, pivot).await?;
        let conflictive_ids = report.conflictive_ids();
        let mut outcome = RevalidationOutcome::default();

        for &id in &report.valid_records {
            if Some(id) == protected {
                continue;
            }
            let Some(mut reading) = tx.find_reading(id).await? else {
                continue;
            };
            if !matches!(reading.status, ReadingStatus::Corrected | ReadingStatus::Conflictive) {
                continue;
            }

            reading.status = ReadingStatus::Original;
            reading.km_normalized = None;
            reading.conflict_reasons.clear();
            reading.correction_notes = None;
            tx.update_reading(&reading).await?;
            outcome.reset.push(id);
        }

        for conflict in &report.conflictive_records {
            if Some(conflict.record_id) == protected {
                continue;
            }
            let Some(reading) = tx.find_reading(conflict.record_id).await? else {
                continue;
            };

            let correction = self.corrector.correct(tx, &reading, &conflictive_ids).await?;
            let mut updated = reading.clone();
            updated.conflict_reasons = conflict.reasons.clone();
            updated.correction_notes = Some(correction.notes.clone());

            match correction.corrected_km {
                Some(corrected_km) if correction.success => {
                    updated.status = ReadingStatus::Corrected;
                    updated.km_normalized = Some(corrected_km);
                }
                _ => {
                    updated.status = ReadingStatus::Conflictive;
                    updated.km_normalized = Some(updated.km_reported);
                }
            }

            if !same_verdict(&reading, &updated) {
                tx.update_reading(&updated).await?;
                if updated.status == ReadingStatus::Corrected {
                    outcome.corrected.push(updated.id);
                } else {
                    outcome.conflictive.push(updated.id);
                }
                log::info!(
                    "🔧 Registro {} -> {} ({:?} km)",
                    updated.id,
                    updated.status.as_str(),
                    updated.km_normalized
                );
            }
        }

        outcome.report = report;
        Ok(outcome)
    }

    /// Recalcula el km actual del vehículo desde su última lectura vigente.
    /// Un fallo aquí se registra y no aborta la operación principal: el
    /// recálculo corre bajo un punto de guardado y se deshace solo él.
    pub async fn refresh_vehicle_mileage(&self, tx: &mut dyn FleetTx, vehicle_id: i64) {
        if let Err(e) = tx.savepoint(MILEAGE_SAVEPOINT).await {
            log::warn!("⚠️ No se pudo actualizar el km del vehículo {}: {}", vehicle_id, e);
            return;
        }

        match recompute_vehicle_mileage(tx, vehicle_id).await {
            Ok(()) => {
                if let Err(e) = tx.release_savepoint(MILEAGE_SAVEPOINT).await {
                    log::warn!("⚠️ No se pudo liberar el punto de guardado: {}", e);
                }
            }
            Err(e) => {
                log::warn!("⚠️ No se pudo actualizar el km del vehículo {}: {}", vehicle_id, e);
                if let Err(e) = tx.rollback_to_savepoint(MILEAGE_SAVEPOINT).await {
                    log::error!("❌ Error volviendo al punto de guardado: {}", e);
                }
            }
        }
    }
}

const MILEAGE_SAVEPOINT: &str = "vehicle_mileage_refresh";

async fn recompute_vehicle_mileage(tx: &mut dyn FleetTx, vehicle_id: i64) -> AppResult<()> {
    let current = tx
        .latest_kept_reading(vehicle_id)
        .await?
        .map(|r| r.effective_km())
        .unwrap_or(0);
    tx.update_vehicle_mileage(vehicle_id, current).await
}

fn same_verdict(a: &MileageReading, b: &MileageReading) -> bool {
    a.status == b.status
        && a.km_normalized == b.km_normalized
        && a.conflict_reasons == b.conflict_reasons
        && a.correction_notes == b.correction_notes
}
