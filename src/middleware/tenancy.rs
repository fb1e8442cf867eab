// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalho HTTP com a clínica em que o usuário está operando
const CLINIC_ID_HEADER: &str = "x-clinic-id";

/// Clínica alvo da requisição. A posse pela organização é conferida
/// pelos serviços, que sempre filtram por `organization_id`.
#[derive(Debug, Clone, Copy)]
pub struct ClinicContext(pub Uuid);

impl ClinicContext {
    pub fn from_header_value(value: Option<&str>) -> Result<Self, AppError> {
        let raw = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::MissingField(CLINIC_ID_HEADER))?;

        // Um UUID malformado conta como cabeçalho ausente
        let clinic_id = Uuid::parse_str(raw).map_err(|_| AppError::MissingField(CLINIC_ID_HEADER))?;
        Ok(ClinicContext(clinic_id))
    }
}

impl<S> FromRequestParts<S> for ClinicContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CLINIC_ID_HEADER)
            .and_then(|v| v.to_str().ok());

        ClinicContext::from_header_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_valid_header() {
        let id = Uuid::new_v4();
        let ctx = ClinicContext::from_header_value(Some(&id.to_string())).unwrap();
        assert_eq!(ctx.0, id);
    }

    #[test]
    fn missing_or_malformed_header_is_rejected() {
        assert!(matches!(
            ClinicContext::from_header_value(None),
            Err(AppError::MissingField("x-clinic-id"))
        ));
        assert!(ClinicContext::from_header_value(Some("nao-e-uuid")).is_err());
        assert!(ClinicContext::from_header_value(Some("  ")).is_err());
    }
}
