use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::{repo_types::User, services::resolve_by_token};
use crate::{error::AppError, state::AppState};

pub const AUTH_HEADER: &str = "x-auth";

/// Resolves the `x-auth` header into a live user. Carries the raw token so
/// logout can revoke exactly the one presented.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Missing, non-UTF-8 and unknown tokens all end up as the same 401.
        let token = parts
            .headers
            .get(AUTH_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        let user = match resolve_by_token(state, token).await {
            Ok(u) => u,
            Err(AppError::Unauthenticated) => {
                warn!("invalid or revoked token");
                return Err(AppError::Unauthenticated);
            }
            Err(e) => return Err(e),
        };

        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}
