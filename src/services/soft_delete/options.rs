//! Opciones de borrado y restauración enviadas por el cliente

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::ForeignKey;

/// Qué hacer con una cascada opcional
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CascadeDecision {
    Delete,
    Keep,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeletionOptions {
    /// Acepta las advertencias forzables
    #[serde(default)]
    pub force: bool,
    /// Decisión por nombre de relación opcional (p. ej. `vehicle_km`)
    #[serde(default)]
    pub cascade_options: BTreeMap<String, CascadeDecision>,
    pub actor_id: Option<Uuid>,
}

impl DeletionOptions {
    pub fn decision_for(&self, relation: &str) -> Option<CascadeDecision> {
        self.cascade_options.get(relation).copied()
    }
}

/// Nuevos padres para resolver conflictos de padre eliminado
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReassignTo {
    pub company_id: Option<i64>,
    pub vehicle_id: Option<i64>,
}

impl ReassignTo {
    pub fn target_for(&self, key: ForeignKey) -> Option<i64> {
        match key {
            ForeignKey::CompanyId => self.company_id,
            ForeignKey::VehicleId => self.vehicle_id,
            ForeignKey::ReadingId | ForeignKey::SourceMaintenance => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.company_id.is_none() && self.vehicle_id.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestorationOptions {
    /// Restaurar todas las cascadas del mismo evento de borrado
    #[serde(default)]
    pub cascade_restore: bool,
    /// Restaurar solo estas relaciones
    pub selected_cascades: Option<Vec<String>>,
    pub reassign_to: Option<ReassignTo>,
    pub actor_id: Option<Uuid>,
}

impl RestorationOptions {
    pub fn reassignment(&self) -> Option<&ReassignTo> {
        self.reassign_to.as_ref().filter(|r| !r.is_empty())
    }

    pub fn selected(&self) -> Option<&[String]> {
        self.selected_cascades.as_deref().filter(|s| !s.is_empty())
    }

    pub fn restores_cascades(&self) -> bool {
        self.cascade_restore || self.selected().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_options_from_json() {
        let options: DeletionOptions =
            serde_json::from_str(r#"{"force": true, "cascade_options": {"vehicle_km": "keep"}}"#).unwrap();
        assert!(options.force);
        assert_eq!(options.decision_for("vehicle_km"), Some(CascadeDecision::Keep));
        assert_eq!(options.decision_for("vehicles"), None);
    }

    #[test]
    fn test_empty_selection_is_ignored() {
        let options = RestorationOptions {
            selected_cascades: Some(Vec::new()),
            reassign_to: Some(ReassignTo::default()),
            ..RestorationOptions::default()
        };
        assert!(!options.restores_cascades());
        assert!(options.reassignment().is_none());
    }
}
