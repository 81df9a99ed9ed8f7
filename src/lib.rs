//! Conciliación de kilometraje de flota y borrado lógico auditado
//!
//! Capas: `config` → `database` → `repositories` (`FleetStore`/`FleetTx`)
//! → `services` (detector de conflictos, corrección, revalidación, borrado
//! y restauración) → `controllers`/`routes` (superficie HTTP).

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_app;
pub use state::AppState;
