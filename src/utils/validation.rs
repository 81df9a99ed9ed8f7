//! Utilidades de validación
//!
//! Validadores `custom` para los requests con `validator`.

use validator::ValidationError;

/// Validar que un string no esté vacío (ignorando espacios)
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_blank");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar formato de matrícula de vehículo
pub fn validate_license_plate(value: &str) -> Result<(), ValidationError> {
    // Formato básico: 1234-ABC, AB-123-CD o similar
    let clean_plate = value.replace([' ', '-', '_'], "");
    let valid_chars = clean_plate.chars().all(|c| c.is_ascii_alphanumeric());
    if clean_plate.len() < 4 || clean_plate.len() > 10 || !valid_chars {
        let mut error = ValidationError::new("license_plate");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Transportes Norte").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }

    #[test]
    fn test_validate_license_plate() {
        assert!(validate_license_plate("1234-ABC").is_ok());
        assert!(validate_license_plate("AB-123-CD").is_ok());
        assert!(validate_license_plate("A1").is_err());
        assert!(validate_license_plate("12#4-ABC").is_err());
    }
}
