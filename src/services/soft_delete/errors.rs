//! Taxonomía de errores del borrado lógico y la restauración
//!
//! Los fallos de la fase de análisis llevan adjunto el análisis de solo
//! lectura para que el cliente pueda explicar el motivo sin haber mutado nada.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::impact_analyzer::ImpactReport;
use super::restoration_analyzer::RestorationReport;
use crate::utils::errors::AppError;

/// Análisis adjunto a un error
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum AnalysisSnapshot {
    Impact(ImpactReport),
    Restoration(RestorationReport),
}

impl From<ImpactReport> for AnalysisSnapshot {
    fn from(report: ImpactReport) -> Self {
        AnalysisSnapshot::Impact(report)
    }
}

impl From<RestorationReport> for AnalysisSnapshot {
    fn from(report: RestorationReport) -> Self {
        AnalysisSnapshot::Restoration(report)
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Bloqueo de política: nunca se puede forzar
    #[error("{message}")]
    Blocked {
        message: String,
        errors: Vec<String>,
        analysis: Box<AnalysisSnapshot>,
    },

    /// Advertencias forzables sin `force: true`
    #[error("{message}")]
    RequiresConfirmation {
        message: String,
        warnings: Vec<String>,
        analysis: Box<AnalysisSnapshot>,
    },

    /// Falta una decisión explícita (cascada opcional, reasignación...)
    #[error("{message}")]
    RequiresDecision {
        message: String,
        pending: Vec<String>,
        analysis: Box<AnalysisSnapshot>,
    },

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    NotFound(String),

    /// Fallo inesperado durante la ejecución transaccional (ya revertida)
    #[error("{message}")]
    InternalFailure {
        message: String,
        analysis: Option<Box<AnalysisSnapshot>>,
    },
}

impl LifecycleError {
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleError::Blocked { .. } => "Blocked",
            LifecycleError::RequiresConfirmation { .. } => "Requires Confirmation",
            LifecycleError::RequiresDecision { .. } => "Requires Decision",
            LifecycleError::ValidationFailed(_) => "Validation Failed",
            LifecycleError::NotFound(_) => "Not Found",
            LifecycleError::InternalFailure { .. } => "Internal Failure",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Blocked { .. } => "BLOCKED",
            LifecycleError::RequiresConfirmation { .. } => "REQUIRES_CONFIRMATION",
            LifecycleError::RequiresDecision { .. } => "REQUIRES_DECISION",
            LifecycleError::ValidationFailed(_) => "VALIDATION_FAILED",
            LifecycleError::NotFound(_) => "NOT_FOUND",
            LifecycleError::InternalFailure { .. } => "INTERNAL_FAILURE",
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisSnapshot> {
        match self {
            LifecycleError::Blocked { analysis, .. }
            | LifecycleError::RequiresConfirmation { analysis, .. }
            | LifecycleError::RequiresDecision { analysis, .. } => Some(analysis),
            LifecycleError::InternalFailure { analysis, .. } => analysis.as_deref(),
            LifecycleError::ValidationFailed(_) | LifecycleError::NotFound(_) => None,
        }
    }

    /// Cuerpo `details` de la respuesta HTTP
    pub fn details(&self) -> Option<serde_json::Value> {
        let analysis = self.analysis().map(|a| json!(a));

        match self {
            LifecycleError::Blocked { errors, .. } => Some(json!({ "errors": errors, "analysis": analysis })),
            LifecycleError::RequiresConfirmation { warnings, .. } => Some(json!({
                "warnings": warnings,
                "requires_force": true,
                "analysis": analysis,
            })),
            LifecycleError::RequiresDecision { pending, .. } => Some(json!({
                "pending_decisions": pending,
                "analysis": analysis,
            })),
            LifecycleError::InternalFailure { .. } => analysis.map(|a| json!({ "analysis": a })),
            LifecycleError::ValidationFailed(_) | LifecycleError::NotFound(_) => None,
        }
    }
}

/// Convierte un fallo de la fase transaccional en `InternalFailure` con el
/// análisis adjunto; los errores de ciclo de vida se propagan tal cual.
pub fn wrap_execution_error(error: AppError, context: &str, analysis: AnalysisSnapshot) -> AppError {
    match error {
        AppError::Lifecycle(inner) => AppError::Lifecycle(inner),
        other => AppError::Lifecycle(LifecycleError::InternalFailure {
            message: format!("{}: {}", context, other),
            analysis: Some(Box::new(analysis)),
        }),
    }
}
