//! Reloj monotónico
//!
//! Todas las marcas de tiempo de borrado/restauración salen de aquí. Un evento
//! de borrado se identifica por su marca de tiempo, así que dos lecturas del
//! reloj nunca devuelven el mismo instante.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Mutex;

/// Reloj estrictamente creciente con resolución de microsegundos (la de PostgreSQL)
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Siguiente instante, siempre posterior al anterior
    pub fn now(&self) -> DateTime<Utc> {
        let candidate = Utc::now().trunc_subsecs(6);
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let next = match *last {
            Some(previous) if candidate <= previous => previous + Duration::microseconds(1),
            _ => candidate,
        };

        *last = Some(next);
        next
    }
}
