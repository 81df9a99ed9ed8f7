//! Chequeo de correlación entre una lectura y sus vecinas inmediatas
//!
//! Heurística consultiva: compara solo contra la lectura vigente anterior y la
//! posterior (fecha estrictamente distinta, sin desempate por id). Nunca cambia
//! el estado de ninguna lectura; eso lo decide el detector de conflictos.

use serde::Serialize;

use crate::config::ReconciliationConfig;
use crate::models::{MileageReading, Severity, TimelineKey};
use crate::repositories::FleetTx;
use crate::utils::errors::AppResult;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    Regression,
    UnrealisticIncrease,
    FutureInconsistency,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorrelationConflict {
    #[serde(rename = "type")]
    pub kind: CorrelationKind,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorrelationReport {
    pub has_conflict: bool,
    pub conflicts: Vec<CorrelationConflict>,
    pub previous_record: Option<MileageReading>,
    pub next_record: Option<MileageReading>,
}

#[derive(Debug, Clone)]
pub struct CorrelationChecker {
    default_max_daily_km: i64,
}

impl CorrelationChecker {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            default_max_daily_km: config.correlation_max_daily_km,
        }
    }

    pub async fn check(&self, tx: &mut dyn FleetTx, reading: &MileageReading) -> AppResult<CorrelationReport> {
        let previous = tx
            .readings_before(reading.vehicle_id, TimelineKey::start_of(reading.input_date), Some(1))
            .await?
            .into_iter()
            .next();
        let next = tx
            .readings_after(reading.vehicle_id, TimelineKey::end_of(reading.input_date), Some(1))
            .await?
            .into_iter()
            .next();

        let max_daily_km = tx
            .find_company(reading.company_id)
            .await?
            .and_then(|company| company.max_daily_km)
            .unwrap_or(self.default_max_daily_km);

        Ok(evaluate(reading, previous, next, max_daily_km))
    }
}

/// Conflictos de `reading` frente a sus vecinas ya localizadas
pub fn evaluate(
    reading: &MileageReading,
    previous: Option<MileageReading>,
    next: Option<MileageReading>,
    max_daily_km: i64,
) -> CorrelationReport {
    let current = reading.effective_km();
    let mut conflicts = Vec::new();

    if let Some(prev) = &previous {
        if current < prev.effective_km() {
            conflicts.push(CorrelationConflict {
                kind: CorrelationKind::Regression,
                message: format!("KM inferior al registro anterior ({} km)", prev.effective_km()),
                severity: Severity::High,
            });
        }

        let days = (reading.input_date - prev.input_date).num_days();
        if days > 0 {
            let daily_avg = (current - prev.effective_km()) as f64 / days as f64;
            if daily_avg > max_daily_km as f64 {
                conflicts.push(CorrelationConflict {
                    kind: CorrelationKind::UnrealisticIncrease,
                    message: format!("Incremento diario promedio muy alto: {:.2} km/día", daily_avg),
                    severity: Severity::Medium,
                });
            }
        }
    }

    if let Some(next) = &next {
        if current > next.effective_km() {
            conflicts.push(CorrelationConflict {
                kind: CorrelationKind::FutureInconsistency,
                message: format!("KM superior al registro posterior ({} km)", next.effective_km()),
                severity: Severity::High,
            });
        }
    }

    CorrelationReport {
        has_conflict: !conflicts.is_empty(),
        conflicts,
        previous_record: previous,
        next_record: next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReadingSource, ReadingStatus, SourceRecord};
    use chrono::{NaiveDate, Utc};

    fn reading(id: i64, day: u32, km: i64) -> MileageReading {
        MileageReading {
            id,
            vehicle_id: 1,
            company_id: 1,
            input_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            source: ReadingSource::Telemetry,
            source_record: SourceRecord::None,
            km_reported: km,
            km_normalized: None,
            status: ReadingStatus::Original,
            correction_notes: None,
            conflict_reasons: Vec::new(),
            discarded_at: None,
            discarded_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_consistent_reading_has_no_conflicts() {
        let report = evaluate(&reading(2, 2, 150), Some(reading(1, 1, 100)), Some(reading(3, 3, 200)), 1000);
        assert!(!report.has_conflict);
        assert!(report.previous_record.is_some());
    }

    #[test]
    fn test_regression_and_future_inconsistency() {
        let report = evaluate(&reading(2, 2, 50), Some(reading(1, 1, 100)), None, 1000);
        assert_eq!(report.conflicts[0].kind, CorrelationKind::Regression);
        assert_eq!(report.conflicts[0].severity, Severity::High);

        let report = evaluate(&reading(2, 2, 500), None, Some(reading(3, 3, 200)), 1000);
        assert_eq!(report.conflicts[0].kind, CorrelationKind::FutureInconsistency);
        assert_eq!(report.conflicts[0].message, "KM superior al registro posterior (200 km)");
    }

    #[test]
    fn test_unrealistic_increase_uses_tolerance() {
        let previous = reading(1, 1, 100);
        let current = reading(2, 3, 2600);

        let report = evaluate(&current, Some(previous.clone()), None, 1000);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kind, CorrelationKind::UnrealisticIncrease);
        assert_eq!(report.conflicts[0].message, "Incremento diario promedio muy alto: 1250.00 km/día");

        let report = evaluate(&current, Some(previous), None, 1500);
        assert!(!report.has_conflict);
    }

    #[test]
    fn test_uses_effective_values() {
        let mut previous = reading(1, 1, 900);
        previous.km_normalized = Some(100);
        let report = evaluate(&reading(2, 2, 150), Some(previous), None, 1000);
        assert!(!report.has_conflict);
    }
}
