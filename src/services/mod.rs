//! Services module
//!
//! Este módulo contiene la lógica de negocio: conciliación de kilometraje,
//! borrado lógico con restauración y consultas de auditoría. Los servicios
//! trabajan sobre `FleetStore` y no conocen el backend concreto.

pub mod audit_log_service;
pub mod conflict_detector_service;
pub mod correlation_check_service;
pub mod fleet_service;
pub mod km_correction_service;
pub mod maintenance_service;
pub mod reading_service;
pub mod revalidation_service;
pub mod soft_delete;

pub use audit_log_service::AuditLogService;
pub use conflict_detector_service::{ConflictDetector, ConflictReport};
pub use correlation_check_service::{CorrelationChecker, CorrelationReport};
pub use fleet_service::FleetService;
pub use km_correction_service::{CorrectionResult, KmCorrector};
pub use maintenance_service::{
    MaintenanceAlerts, MaintenanceChange, MaintenanceKmAlert, MaintenanceService, MaintenanceSync, SyncAction,
};
pub use reading_service::{ReadingMutation, ReadingService};
pub use revalidation_service::{RevalidationOutcome, RevalidationService};
