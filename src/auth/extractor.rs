use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::jwt::{validate_token, Claims};
use crate::{error::AppError, state::AppState};

/// Signed-in caller; rejects with 401 when the bearer token is missing or invalid.
pub struct CurrentUser(pub Claims);

/// Signed-in administrator; 401 without a token, 403 for non-admins.
pub struct AdminUser(pub Claims);

/// Optional caller; a missing or invalid token yields a guest.
pub struct MaybeUser(pub Option<Claims>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::unauthorized("Bearer token not found"))?;
        validate_token(token, &state.config.jwt_secret).map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) = CurrentUser::from_request_parts(parts, state).await?;
        if !claims.is_admin {
            return Err(AppError::forbidden("You do not have permission to access this route"));
        }
        Ok(AdminUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(parts).and_then(|token| validate_token(token, &state.config.jwt_secret).ok());
        Ok(MaybeUser(claims))
    }
}
