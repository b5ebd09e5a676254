use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use crate::error::AppError;
use crate::state::AppState;
use std::sync::Arc;
use tracing::{warn, Span};

/// Admin access: `Authorization: Bearer <ADMIN_TOKEN>`.
pub struct AdminUser;

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = <Arc<AppState> as FromRef<S>>::from_ref(state);

        let token = parts.headers.get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        if app_state.config.admin_token.is_empty() || token != app_state.config.admin_token {
            warn!("Rejected admin request with invalid token");
            return Err(AppError::Unauthorized);
        }

        Span::current().record("admin", true);
        Ok(AdminUser)
    }
}
