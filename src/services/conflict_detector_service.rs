//! Detector de conflictos de kilometraje
//!
//! Construye una ventana de lecturas vigentes alrededor del pivote y busca la
//! subsecuencia no decreciente más larga (por km reportado). Todo lo que queda
//! fuera de la subsecuencia elegida es conflictivo. No escribe nada: quien lo
//! llama decide qué hacer con el veredicto.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

use crate::config::ReconciliationConfig;
use crate::models::MileageReading;
use crate::repositories::FleetTx;
use crate::utils::errors::AppResult;

/// Lectura fuera de la secuencia coherente
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConflictiveRecord {
    pub record_id: i64,
    pub date: NaiveDate,
    pub km: i64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ConflictReport {
    pub has_conflict: bool,
    /// El pivote queda fuera del rango [anterior, posterior] inmediato
    pub immediate_conflict: bool,
    pub current_is_conflictive: bool,
    pub conflictive_records: Vec<ConflictiveRecord>,
    pub valid_records: Vec<i64>,
}

impl ConflictReport {
    pub fn conflictive_ids(&self) -> HashSet<i64> {
        self.conflictive_records.iter().map(|c| c.record_id).collect()
    }
}

/// Mejor cadena que termina en una posición, con o sin el pivote
#[derive(Debug, Clone, Copy)]
struct Chain {
    len: usize,
    score: i64,
    parent: Option<(usize, bool)>,
}

impl Chain {
    fn beats(&self, other: &Chain) -> bool {
        (self.len, self.score) > (other.len, other.score)
    }
}

#[derive(Debug, Clone)]
pub struct ConflictDetector {
    window_size: usize,
    quality_max_daily_rate: f64,
}

impl ConflictDetector {
    pub const PIVOT_BONUS: i64 = 100;
    pub const GAP_PENALTY: i64 = 10;
    pub const RATE_PENALTY: i64 = 3;

    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            window_size: config.window_size,
            quality_max_daily_rate: config.quality_max_daily_rate,
        }
    }

    /// Analiza la ventana del pivote. El pivote puede estar descartado (borrado
    /// reciente): en ese caso la ventana se arma con sus vecinos y él no entra.
    pub async fn detect(&self, tx: &mut dyn FleetTx, pivot: &MileageReading) -> AppResult<ConflictReport> {
        let key = pivot.timeline_key();
        let before = tx
            .readings_before(pivot.vehicle_id, key, Some(self.window_size))
            .await?;
        let after = tx
            .readings_after(pivot.vehicle_id, key, Some(self.window_size))
            .await?;

        let immediate = pivot.is_kept()
            && immediate_conflict(before.first(), pivot.km_reported, after.first());

        let mut window: Vec<MileageReading> = before.into_iter().rev().collect();
        if pivot.is_kept() {
            window.push(pivot.clone());
        }
        window.extend(after);

        let mut seen = HashSet::new();
        window.retain(|r| seen.insert(r.id));
        window.sort_by_key(|r| r.timeline_key());

        let report = self.analyze_window(&window, pivot.id, immediate);
        log::debug!(
            "🔍 Ventana de {} lecturas para registro {}: {} conflictivas",
            window.len(),
            pivot.id,
            report.conflictive_records.len()
        );

        Ok(report)
    }

    /// Veredicto sobre una ventana ya ordenada por (fecha, id)
    pub fn analyze_window(&self, window: &[MileageReading], pivot_id: i64, immediate: bool) -> ConflictReport {
        if window.is_empty() {
            return ConflictReport {
                immediate_conflict: immediate,
                ..ConflictReport::default()
            };
        }

        let chosen = self.longest_coherent_sequence(window, pivot_id);
        let valid: HashSet<usize> = chosen.iter().copied().collect();

        let valid_records = chosen.iter().map(|&i| window[i].id).collect();
        let conflictive_records: Vec<ConflictiveRecord> = (0..window.len())
            .filter(|i| !valid.contains(i))
            .map(|i| conflict_details(window, i))
            .collect();

        ConflictReport {
            has_conflict: !conflictive_records.is_empty(),
            immediate_conflict: immediate,
            current_is_conflictive: conflictive_records.iter().any(|c| c.record_id == pivot_id),
            conflictive_records,
            valid_records,
        }
    }

    /// Índices de la subsecuencia no decreciente elegida. A igual longitud gana
    /// la que contiene el pivote y, después, la de mejor puntuación.
    fn longest_coherent_sequence(&self, window: &[MileageReading], pivot_id: i64) -> Vec<usize> {
        let n = window.len();
        // best[i][f]: mejor cadena que termina en i; f indica si contiene el pivote
        let mut best: Vec<[Option<Chain>; 2]> = vec![[None, None]; n];

        for i in 0..n {
            let is_pivot = window[i].id == pivot_id;
            best[i][is_pivot as usize] = Some(Chain {
                len: 1,
                score: 0,
                parent: None,
            });

            for j in 0..i {
                if window[i].km_reported < window[j].km_reported {
                    continue;
                }
                let step = self.pair_penalty(window, j, i);

                for from_flag in [false, true] {
                    let Some(prev) = best[j][from_flag as usize] else {
                        continue;
                    };
                    let flag = from_flag || is_pivot;
                    let candidate = Chain {
                        len: prev.len + 1,
                        score: prev.score + step,
                        parent: Some((j, from_flag)),
                    };

                    let replace = match &best[i][flag as usize] {
                        Some(current) => candidate.beats(current),
                        None => true,
                    };
                    if replace {
                        best[i][flag as usize] = Some(candidate);
                    }
                }
            }
        }

        let mut winner: Option<(usize, bool, Chain)> = None;
        for (i, chains) in best.iter().enumerate() {
            for flag in [false, true] {
                let Some(chain) = chains[flag as usize] else {
                    continue;
                };
                let bonus = if flag { Self::PIVOT_BONUS } else { 0 };
                let better = match &winner {
                    None => true,
                    Some((_, w_flag, w_chain)) => {
                        let w_bonus = if *w_flag { Self::PIVOT_BONUS } else { 0 };
                        (chain.len, flag, chain.score + bonus) > (w_chain.len, *w_flag, w_chain.score + w_bonus)
                    }
                };
                if better {
                    winner = Some((i, flag, chain));
                }
            }
        }

        let mut sequence = Vec::new();
        let mut cursor = winner.map(|(i, flag, _)| (i, flag));
        while let Some((i, flag)) = cursor {
            sequence.push(i);
            cursor = best[i][flag as usize].and_then(|chain| chain.parent);
        }
        sequence.reverse();
        sequence
    }

    /// Penalización de unir j con i: posiciones saltadas y ritmo diario excesivo
    fn pair_penalty(&self, window: &[MileageReading], j: usize, i: usize) -> i64 {
        let skipped = (i - j - 1) as i64;
        let mut penalty = -Self::GAP_PENALTY * skipped;

        let days = (window[i].input_date - window[j].input_date).num_days();
        if days > 0 {
            let daily_rate = (window[i].km_reported - window[j].km_reported) as f64 / days as f64;
            if daily_rate > self.quality_max_daily_rate {
                penalty -= Self::RATE_PENALTY;
            }
        }

        penalty
    }
}

/// El km del pivote cae fuera de los límites de sus vecinos inmediatos
pub fn immediate_conflict(
    previous: Option<&MileageReading>,
    current_km: i64,
    next: Option<&MileageReading>,
) -> bool {
    match (previous, next) {
        (Some(prev), None) => current_km < prev.km_reported,
        (None, Some(next)) => current_km > next.km_reported,
        (Some(prev), Some(next)) => !(prev.km_reported <= current_km && current_km <= next.km_reported),
        (None, None) => false,
    }
}

fn conflict_details(window: &[MileageReading], index: usize) -> ConflictiveRecord {
    let record = &window[index];
    let previous = index.checked_sub(1).map(|i| &window[i]);
    let next = window.get(index + 1);
    let mut reasons = Vec::new();

    if let Some(prev) = previous {
        if record.km_reported < prev.km_reported {
            reasons.push(format!(
                "KM inferior al registro anterior ({} km el {})",
                prev.km_reported,
                prev.input_date.format("%d/%m/%Y")
            ));
        }
    }

    if let Some(next) = next {
        if record.km_reported > next.km_reported {
            reasons.push(format!(
                "KM superior al registro posterior ({} km el {})",
                next.km_reported,
                next.input_date.format("%d/%m/%Y")
            ));
        }
    }

    if reasons.is_empty() {
        reasons.push("No forma parte de la secuencia creciente más coherente".to_string());
    }

    ConflictiveRecord {
        record_id: record.id,
        date: record.input_date,
        km: record.km_reported,
        reasons,
    }
}
