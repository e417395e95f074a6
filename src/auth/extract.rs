use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::verify_token;
use crate::db::{
    models::{Role, User},
    users,
};
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, loaded fresh from the database on every request.
pub struct AuthUser(pub User);

/// An authenticated caller with the retailer role.
pub struct RetailerUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;

        let claims = verify_token(token, &state.config.jwt_secret).map_err(|e| {
            log::warn!("Rejected bearer token: {}", e);
            AppError::Unauthorized("Not authorized, token failed".into())
        })?;

        let user = users::find_by_id(&state.pool, claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Not authorized, user no longer exists".into()))?;

        Ok(AuthUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RetailerUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Retailer {
            return Err(AppError::Unauthorized("Not authorized as a retailer".into()));
        }
        Ok(RetailerUser(user))
    }
}
