//! User JWT authentication middleware.
//!
//! Validates the Bearer token on protected routes and stores the
//! authenticated user in request extensions.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Authenticated user stored in request extensions.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// User ID from the JWT subject claim.
    pub user_id: Uuid,
}

/// Validates a Bearer token and returns the authenticated user.
pub fn authenticate(state: &AppState, auth_header: Option<&str>) -> Result<UserAuth, ApiError> {
    let header =
        auth_header.ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".into()))?;

    let claims = state
        .jwt_verifier
        .validate(token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    let user_id = shared::jwt::extract_user_id(&claims)
        .map_err(|_| ApiError::Unauthorized("Invalid token subject".into()))?;

    Ok(UserAuth { user_id })
}

/// Middleware that requires a valid user JWT.
///
/// Runs before rate limiting so the limiter can key on the user ID.
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    match authenticate(&state, auth_header) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}
