//! Utilidades del sistema
//!
//! Este módulo contiene el manejo de errores, el reloj monotónico y
//! los validadores comunes.

pub mod clock;
pub mod errors;
pub mod validation;

pub use clock::MonotonicClock;
