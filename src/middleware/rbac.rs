// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    middleware::auth::{AuthContext, AuthenticatedUser},
};

/// 1. O Trait que define um grupo de papéis autorizados
pub trait RoleDef: Send + Sync + 'static {
    fn allowed() -> &'static [&'static str];

    fn permits(ctx: &AuthContext) -> bool {
        Self::allowed().iter().any(|role| ctx.has_role(role))
    }
}

/// 2. O Extractor (Guardião)
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // A. Usuário já validado pelo auth_guard
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)?;

        // B. Confere os papéis do token
        if !T::permits(&user.0) {
            tracing::warn!(
                "⛔ Usuário {} sem papel exigido ({:?})",
                user.0.user_id,
                T::allowed()
            );
            return Err(AppError::Forbidden);
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct RoleScheduling;
impl RoleDef for RoleScheduling {
    fn allowed() -> &'static [&'static str] { &["admin", "receptionist", "doctor"] }
}

pub struct RoleFinance;
impl RoleDef for RoleFinance {
    fn allowed() -> &'static [&'static str] { &["admin", "cashier"] }
}

pub struct RoleAdmin;
impl RoleDef for RoleAdmin {
    fn allowed() -> &'static [&'static str] { &["admin"] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(roles: &[&str]) -> AuthContext {
        AuthContext {
            organization_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn roles_gate_by_group() {
        assert!(RoleFinance::permits(&ctx(&["cashier"])));
        assert!(!RoleFinance::permits(&ctx(&["receptionist"])));
        assert!(RoleScheduling::permits(&ctx(&["doctor"])));
        assert!(RoleAdmin::permits(&ctx(&["cashier", "admin"])));
        assert!(!RoleAdmin::permits(&ctx(&[])));
    }
}
