//! DTOs de la API
//!
//! Requests y responses de la capa HTTP; los modelos de dominio no se
//! serializan tal cual hacia el cliente.

pub mod api_response;
pub mod fleet_dto;
pub mod reading_dto;
pub mod soft_delete_dto;

pub use api_response::ApiResponse;
