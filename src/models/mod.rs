//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean
//! al schema PostgreSQL de flota, kilometraje y auditoría.

pub mod audit_log;
pub mod company;
pub mod lifecycle;
pub mod maintenance;
pub mod mileage_reading;
pub mod severity;
pub mod vehicle;

pub use audit_log::*;
pub use company::*;
pub use lifecycle::*;
pub use maintenance::*;
pub use mileage_reading::*;
pub use severity::*;
pub use vehicle::*;
