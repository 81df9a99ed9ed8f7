//! Modelo de Company
//!
//! Este módulo contiene el struct Company y su request de creación.
//! Mapea exactamente a la tabla companies con primary key 'id'.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Company principal - mapea exactamente a la tabla companies
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    /// Tolerancia diaria de km; la consulta el chequeo de correlación, no el detector
    pub max_daily_km: Option<i64>,
    pub discarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn is_kept(&self) -> bool {
        self.discarded_at.is_none()
    }
}

/// Request para crear una nueva company
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(
        length(min = 2, max = 255),
        custom = "crate::utils::validation::validate_not_blank"
    )]
    pub name: String,

    #[validate(length(min = 3, max = 32))]
    pub tax_id: Option<String>,

    #[validate(range(min = 1, max = 5000))]
    pub max_daily_km: Option<i64>,
}
