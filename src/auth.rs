// Acting-user resolution for handlers.
//
// Session issuance lives outside this service; requests carry the
// already-authenticated user as an X-User-Id header, which is resolved
// against the users table before any handler logic runs.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::User;

pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .ok_or_else(|| AppError::Unauthorized("Authentication required.".to_string()))?;

        let user_id: i64 = header
            .to_str()
            .ok()
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| AppError::Unauthorized("Invalid X-User-Id header.".to_string()))?;

        let user = state
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown user {}", user_id)))?;

        Ok(AuthUser(user))
    }
}
