//! Análisis de impacto de un borrado
//!
//! Calcula, sin mutar nada, qué bloquea el borrado, qué se borrará en
//! cascada, qué se desvinculará y qué advertencias hay que aceptar.

use serde::Serialize;

use super::policy::{policy_for, PolicyValidation};
use super::relations::cascade_ids;
use crate::models::{EntityKind, ForeignKey, LifecycleRecord, RecordScope, Severity};
use crate::repositories::FleetTx;
use crate::utils::errors::AppResult;

/// Estimación gruesa de duración según registros afectados
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EstimatedTime {
    Instant,
    Seconds,
    Minutes,
    BackgroundJob,
    Manual,
}

impl EstimatedTime {
    pub fn from_count(count: usize) -> Self {
        match count {
            0..=10 => EstimatedTime::Instant,
            11..=100 => EstimatedTime::Seconds,
            101..=1000 => EstimatedTime::Minutes,
            _ => EstimatedTime::BackgroundJob,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockerKind {
    Relation,
    Validation,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImpactBlocker {
    #[serde(rename = "type")]
    pub kind: BlockerKind,
    pub relation: Option<String>,
    pub count: Option<usize>,
    pub message: String,
    pub severity: Severity,
    pub can_force: bool,
}

impl ImpactBlocker {
    pub fn validation(message: String) -> Self {
        Self {
            kind: BlockerKind::Validation,
            relation: None,
            count: None,
            message,
            severity: Severity::Critical,
            can_force: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CascadeImpact {
    pub relation: String,
    pub model: EntityKind,
    pub count: usize,
    pub optional: bool,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NullifyImpact {
    pub relation: String,
    pub model: EntityKind,
    pub count: usize,
    pub action: String,
    pub foreign_key: ForeignKey,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Validation,
    Cascade,
    ModelSpecific,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImpactWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub message: String,
    pub severity: Severity,
    pub can_force: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImpactReport {
    pub record: LifecycleRecord,
    pub can_delete: bool,
    pub blockers: Vec<ImpactBlocker>,
    pub will_cascade: Vec<CascadeImpact>,
    pub will_nullify: Vec<NullifyImpact>,
    pub warnings: Vec<ImpactWarning>,
    pub estimated_time: EstimatedTime,
    pub recommendation: String,
    pub total_affected: usize,
}

impl ImpactReport {
    pub fn cascade_total(&self) -> usize {
        self.will_cascade.iter().map(|c| c.count).sum()
    }

    pub fn nullify_total(&self) -> usize {
        self.will_nullify.iter().map(|n| n.count).sum()
    }

    pub fn requires_force(&self) -> bool {
        self.warnings.iter().any(|w| w.can_force)
    }

    pub fn optional_cascades(&self) -> Vec<CascadeImpact> {
        self.will_cascade.iter().filter(|c| c.optional).cloned().collect()
    }

    pub fn blocker_messages(&self) -> Vec<String> {
        self.blockers.iter().map(|b| b.message.clone()).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.message.clone()).collect()
    }
}

/// Analiza el borrado de un registro vigente
pub async fn analyze(tx: &mut dyn FleetTx, record: &LifecycleRecord) -> AppResult<ImpactReport> {
    let policy = policy_for(record.kind());
    let mut blockers = Vec::new();
    let mut validation_warnings = Vec::new();

    for relation in policy.blocking_relations {
        let count = tx
            .related_ids(relation.target, relation.key, record.id(), RecordScope::Kept)
            .await?
            .len();
        if count > 0 {
            blockers.push(ImpactBlocker {
                kind: BlockerKind::Relation,
                relation: Some(relation.name.to_string()),
                count: Some(count),
                message: format!("Tiene {} {}", count, relation.message),
                severity: Severity::Critical,
                can_force: false,
            });
        }
    }

    for validation in policy.hooks.deletion_validations(tx, record).await? {
        match validation {
            PolicyValidation::Blocker(message) => blockers.push(ImpactBlocker::validation(message)),
            PolicyValidation::Warning {
                message,
                severity,
                can_force,
            } => validation_warnings.push(ImpactWarning {
                kind: WarningKind::Validation,
                message,
                severity,
                can_force,
            }),
        }
    }

    let mut will_cascade = Vec::new();
    for relation in policy.cascade_relations {
        if !relation.applies_to(record) {
            continue;
        }
        let count = cascade_ids(tx, relation, record.id(), RecordScope::Kept).await?.len();
        if count > 0 {
            will_cascade.push(CascadeImpact {
                relation: relation.name.to_string(),
                model: relation.target,
                count,
                optional: relation.optional,
                action: if relation.optional {
                    "Opcional: puede borrar o mantener".to_string()
                } else {
                    "Se borrarán automáticamente".to_string()
                },
            });
        }
    }

    let mut will_nullify = Vec::new();
    for relation in policy.nullify_relations {
        let count = tx
            .related_ids(relation.target, relation.key, record.id(), RecordScope::Kept)
            .await?
            .len();
        if count > 0 {
            will_nullify.push(NullifyImpact {
                relation: relation.name.to_string(),
                model: relation.target,
                count,
                action: "Se desvinculará (foreign key = NULL)".to_string(),
                foreign_key: relation.key,
            });
        }
    }

    let cascade_total = will_cascade.iter().map(|c| c.count).sum();
    let model_warnings = policy.hooks.model_warnings(tx, record, cascade_total).await?;

    Ok(assemble_impact(
        record.clone(),
        blockers,
        will_cascade,
        will_nullify,
        validation_warnings,
        model_warnings,
    ))
}

/// Arma el informe a partir de las piezas ya calculadas. `can_delete` es
/// falso si y solo si hay al menos un bloqueo.
pub fn assemble_impact(
    record: LifecycleRecord,
    blockers: Vec<ImpactBlocker>,
    will_cascade: Vec<CascadeImpact>,
    will_nullify: Vec<NullifyImpact>,
    validation_warnings: Vec<ImpactWarning>,
    model_warnings: Vec<ImpactWarning>,
) -> ImpactReport {
    let cascade_total: usize = will_cascade.iter().map(|c| c.count).sum();
    let nullify_total: usize = will_nullify.iter().map(|n| n.count).sum();
    let total_affected = cascade_total + nullify_total;

    let mut warnings = validation_warnings;
    warnings.extend(cascade_warnings(cascade_total));
    warnings.extend(model_warnings);

    let recommendation = recommendation(&blockers, &warnings);

    ImpactReport {
        record,
        can_delete: blockers.is_empty(),
        blockers,
        will_cascade,
        will_nullify,
        warnings,
        estimated_time: EstimatedTime::from_count(total_affected),
        recommendation,
        total_affected,
    }
}

fn cascade_warnings(cascade_total: usize) -> Vec<ImpactWarning> {
    let mut warnings = Vec::new();

    if cascade_total > 100 && cascade_total <= 1000 {
        warnings.push(ImpactWarning {
            kind: WarningKind::Cascade,
            message: format!(
                "Se borrarán más de 100 registros en cascada ({} total)",
                cascade_total
            ),
            severity: Severity::High,
            can_force: true,
        });
    }

    if cascade_total > 1000 {
        warnings.push(ImpactWarning {
            kind: WarningKind::Cascade,
            message: format!(
                "OPERACIÓN MASIVA: {} registros se borrarán. Esta operación puede tardar varios minutos.",
                cascade_total
            ),
            severity: Severity::Critical,
            can_force: true,
        });
    }

    warnings
}

fn recommendation(blockers: &[ImpactBlocker], warnings: &[ImpactWarning]) -> String {
    if !blockers.is_empty() {
        return "BLOQUEADO: Resuelva los bloqueos antes de continuar".to_string();
    }

    if let Some(critical) = warnings
        .iter()
        .find(|w| w.severity == Severity::Critical && !w.can_force)
    {
        return format!("BLOQUEADO: {}", critical.message);
    }

    if warnings.iter().any(|w| w.severity == Severity::High) {
        return "PRECAUCIÓN: Revise las advertencias antes de proceder".to_string();
    }

    if warnings.iter().any(|w| w.severity == Severity::Medium) {
        return "ATENCIÓN: Revise las advertencias".to_string();
    }

    "OK: Seguro para borrar".to_string()
}
