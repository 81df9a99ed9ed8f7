//! Controladores
//!
//! Adaptan las respuestas de los servicios al formato `ApiResponse`.

pub mod fleet_controller;
pub mod reading_controller;
pub mod soft_delete_controller;
