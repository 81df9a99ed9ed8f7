//! Borrado lógico con cascadas, restauración y auditoría
//!
//! Las políticas por entidad (`policy`) declaran relaciones y hooks; los
//! analizadores calculan el impacto sin mutar nada y los coordinadores
//! ejecutan la operación completa dentro de una única transacción.

pub mod deletion_coordinator;
pub mod errors;
pub mod impact_analyzer;
pub mod options;
pub mod policy;
pub mod relations;
pub mod restoration_analyzer;
pub mod restoration_coordinator;

pub use deletion_coordinator::{DeletionCoordinator, DeletionPreview, DeletionResult};
pub use errors::{AnalysisSnapshot, LifecycleError};
pub use impact_analyzer::ImpactReport;
pub use options::{CascadeDecision, DeletionOptions, ReassignTo, RestorationOptions};
pub use policy::policy_for;
pub use restoration_analyzer::RestorationReport;
pub use restoration_coordinator::{RestorationCoordinator, RestorationPreview, RestorationResult};
