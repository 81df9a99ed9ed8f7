//! Corrección de registros de km conflictivos
//!
//! Calcula un valor corregido a partir de los registros válidos (no
//! conflictivos) más cercanos: interpolación lineal si hay vecino anterior y
//! posterior, extrapolación con la tendencia histórica si solo hay uno.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::ReconciliationConfig;
use crate::models::{MileageReading, ReadingStatus};
use crate::repositories::FleetTx;
use crate::utils::errors::AppResult;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    Interpolation,
    ExtrapolationForward,
    ExtrapolationBackward,
    None,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorrectionResult {
    pub success: bool,
    pub corrected_km: Option<i64>,
    pub method: CorrectionMethod,
    pub notes: String,
}

impl CorrectionResult {
    pub const FAILURE_NOTES: &'static str = "No se pudo calcular corrección - faltan registros válidos";

    fn failure() -> Self {
        Self {
            success: false,
            corrected_km: None,
            method: CorrectionMethod::None,
            notes: Self::FAILURE_NOTES.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KmCorrector {
    default_daily_rate: f64,
    history_sample: usize,
}

impl KmCorrector {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            default_daily_rate: config.default_daily_rate,
            history_sample: config.history_sample,
        }
    }

    /// Corrige `reading` con las lecturas vigentes del vehículo. `excluded`
    /// son ids que no cuentan como válidos aunque su estado aún no lo refleje
    /// (los conflictivos de la pasada de revalidación en curso).
    pub async fn correct(
        &self,
        tx: &mut dyn FleetTx,
        reading: &MileageReading,
        excluded: &HashSet<i64>,
    ) -> AppResult<CorrectionResult> {
        let valid: Vec<MileageReading> = tx
            .kept_readings(reading.vehicle_id)
            .await?
            .into_iter()
            .filter(|r| {
                r.id != reading.id && r.status != ReadingStatus::Conflictive && !excluded.contains(&r.id)
            })
            .collect();

        Ok(self.correct_with(reading, &valid))
    }

    /// `valid` debe venir ordenado por (fecha, id) y sin la propia lectura
    pub fn correct_with(&self, reading: &MileageReading, valid: &[MileageReading]) -> CorrectionResult {
        let key = reading.timeline_key();
        let previous = valid.iter().filter(|r| r.timeline_key() < key).last();
        let next = valid.iter().find(|r| r.timeline_key() > key);

        let (corrected, method) = match (previous, next) {
            (Some(prev), Some(next)) => (interpolate(reading, prev, next), CorrectionMethod::Interpolation),
            (Some(prev), None) => (
                self.extrapolate_forward(reading, prev, valid),
                CorrectionMethod::ExtrapolationForward,
            ),
            (None, Some(next)) => (
                self.extrapolate_backward(reading, next, valid),
                CorrectionMethod::ExtrapolationBackward,
            ),
            (None, None) => (None, CorrectionMethod::None),
        };

        match corrected {
            Some(corrected_km) => CorrectionResult {
                success: true,
                corrected_km: Some(corrected_km),
                method,
                notes: build_notes(reading, previous, next, corrected_km),
            },
            None => CorrectionResult::failure(),
        }
    }

    fn extrapolate_forward(
        &self,
        reading: &MileageReading,
        prev: &MileageReading,
        valid: &[MileageReading],
    ) -> Option<i64> {
        let history: Vec<&MileageReading> = valid.iter().filter(|r| r.input_date < reading.input_date).collect();
        let rate = self.historical_rate(&history);
        if rate <= 0.0 {
            return None;
        }

        let days = (reading.input_date - prev.input_date).num_days();
        if days <= 0 {
            return None;
        }

        let km_prev = prev.effective_km();
        let estimated = (km_prev as f64 + rate * days as f64).round() as i64;
        (estimated > km_prev).then_some(estimated)
    }

    fn extrapolate_backward(
        &self,
        reading: &MileageReading,
        next: &MileageReading,
        valid: &[MileageReading],
    ) -> Option<i64> {
        let history: Vec<&MileageReading> = valid.iter().filter(|r| r.input_date > reading.input_date).collect();
        let rate = self.historical_rate(&history);
        if rate <= 0.0 {
            return None;
        }

        let days = (next.input_date - reading.input_date).num_days();
        if days <= 0 {
            return None;
        }

        let km_next = next.effective_km();
        let estimated = (km_next as f64 - rate * days as f64).round() as i64;
        (estimated < km_next && estimated >= 0).then_some(estimated)
    }

    /// Ritmo km/día de las últimas `history_sample` lecturas, redondeado a 2 decimales
    fn historical_rate(&self, history: &[&MileageReading]) -> f64 {
        let sample = &history[history.len().saturating_sub(self.history_sample)..];
        let (first, last) = match (sample.first(), sample.last()) {
            (Some(first), Some(last)) if sample.len() >= 2 => (first, last),
            _ => return self.default_daily_rate,
        };

        let total_km = last.effective_km() - first.effective_km();
        let total_days = (last.input_date - first.input_date).num_days();
        if total_days <= 0 || total_km <= 0 {
            return self.default_daily_rate;
        }

        (total_km as f64 / total_days as f64 * 100.0).round() / 100.0
    }
}

fn interpolate(reading: &MileageReading, prev: &MileageReading, next: &MileageReading) -> Option<i64> {
    let days_total = (next.input_date - prev.input_date).num_days();
    if days_total <= 0 {
        return None;
    }

    let days_from_prev = (reading.input_date - prev.input_date).num_days();
    if days_from_prev < 0 {
        return None;
    }

    let km_prev = prev.effective_km();
    let km_total = next.effective_km() - km_prev;
    if km_total < 0 {
        return None;
    }

    let km_per_day = km_total as f64 / days_total as f64;
    Some((km_prev as f64 + km_per_day * days_from_prev as f64).round() as i64)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn build_notes(
    reading: &MileageReading,
    previous: Option<&MileageReading>,
    next: Option<&MileageReading>,
    corrected_km: i64,
) -> String {
    let mut notes = Vec::new();

    match (previous, next) {
        (Some(prev), Some(next)) => {
            notes.push(format!(
                "Interpolación lineal entre {} ({} km)",
                format_date(prev.input_date),
                prev.effective_km()
            ));
            notes.push(format!("y {} ({} km)", format_date(next.input_date), next.effective_km()));
        }
        (Some(prev), None) => {
            notes.push(format!(
                "Extrapolación forward desde {} ({} km)",
                format_date(prev.input_date),
                prev.effective_km()
            ));
            notes.push("usando tendencia histórica".to_string());
        }
        (None, Some(next)) => {
            notes.push(format!(
                "Extrapolación backward desde {} ({} km)",
                format_date(next.input_date),
                next.effective_km()
            ));
            notes.push("usando tendencia histórica".to_string());
        }
        (None, None) => {}
    }

    notes.push(format!(
        "KM reportado: {}, KM corregido: {}",
        reading.km_reported, corrected_km
    ));
    notes.join(". ")
}
