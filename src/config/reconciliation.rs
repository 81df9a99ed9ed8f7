//! Parámetros del motor de conciliación de kilometraje

use super::environment::env_or;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationConfig {
    /// Vecinos vigentes a cada lado del pivote en la ventana del detector
    pub window_size: usize,
    /// Ritmo diario a partir del cual un par de la subsecuencia penaliza
    pub quality_max_daily_rate: f64,
    /// Ritmo diario máximo del chequeo de correlación si la compañía no define uno
    pub correlation_max_daily_km: i64,
    /// Ritmo de extrapolación cuando no hay historial suficiente
    pub default_daily_rate: f64,
    /// Lecturas usadas para calcular el ritmo histórico
    pub history_sample: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            quality_max_daily_rate: 300.0,
            correlation_max_daily_km: 1000,
            default_daily_rate: 50.0,
            history_sample: 10,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            window_size: env_or("KM_WINDOW_SIZE", defaults.window_size),
            quality_max_daily_rate: env_or("KM_QUALITY_MAX_DAILY_RATE", defaults.quality_max_daily_rate),
            correlation_max_daily_km: env_or("KM_CORRELATION_MAX_DAILY", defaults.correlation_max_daily_km),
            default_daily_rate: env_or("KM_DEFAULT_DAILY_RATE", defaults.default_daily_rate),
            history_sample: env_or("KM_HISTORY_SAMPLE", defaults.history_sample).max(2),
        }
    }
}
