// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::error::AppError, config::AppState};

/// Claims emitidas pelo serviço de identidade externo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // usuário
    pub org: Uuid, // organização
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
}

/// O trio (organização, usuário, papéis) que o núcleo enxerga.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

impl AuthContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<AuthContext, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;

    let claims = token_data.claims;
    Ok(AuthContext {
        organization_id: claims.org,
        user_id: claims.sub,
        roles: claims.roles,
    })
}

/// Emite um token de serviço (scripts, testes de ponta a ponta).
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    organization_id: Uuid,
    roles: &[&str],
    ttl: chrono::Duration,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        org: organization_id,
        roles: roles.iter().map(|r| r.to_string()).collect(),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

// O middleware em si
pub async fn auth_guard(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::InvalidToken)?;

    let context = decode_token(bearer.token(), &app_state.jwt_secret)?;

    // Insere o usuário nos "extensions" da requisição
    request.extensions_mut().insert(AuthenticatedUser(context));
    Ok(next.run(request).await)
}

// Extrator para obter o usuário autenticado diretamente nos handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AuthContext);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "segredo-de-teste";

    #[test]
    fn token_round_trips_to_the_auth_triple() {
        let user_id = Uuid::new_v4();
        let org_id = Uuid::new_v4();
        let token = issue_token(
            SECRET,
            user_id,
            org_id,
            &["cashier"],
            chrono::Duration::hours(1),
        )
        .unwrap();

        let ctx = decode_token(&token, SECRET).unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.organization_id, org_id);
        assert!(ctx.has_role("cashier"));
        assert!(!ctx.is_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(
            SECRET,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &[],
            chrono::Duration::hours(1),
        )
        .unwrap();

        assert!(matches!(
            decode_token(&token, "outro-segredo"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(
            SECRET,
            Uuid::new_v4(),
            Uuid::new_v4(),
            &["admin"],
            chrono::Duration::hours(-2),
        )
        .unwrap();

        assert!(decode_token(&token, SECRET).is_err());
    }
}
