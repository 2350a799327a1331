//! User JWT authentication extractor.
//!
//! Provides an Axum extractor for accessing the authenticated user in
//! handlers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::{authenticate, UserAuth as UserAuthData};

/// Authenticated user information from JWT.
///
/// Reads the user placed in request extensions by the auth middleware, or
/// validates the Bearer token directly when the route is not behind it.
#[derive(Debug, Clone)]
pub struct UserAuth {
    /// User ID from the JWT subject claim.
    pub user_id: Uuid,
}

impl From<UserAuthData> for UserAuth {
    fn from(data: UserAuthData) -> Self {
        Self {
            user_id: data.user_id,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Check if auth info was already inserted by middleware
        if let Some(auth) = parts.extensions.get::<UserAuthData>() {
            return Ok(auth.clone().into());
        }

        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok());

        let auth = authenticate(state, auth_header)?;
        Ok(auth.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_middleware_data() {
        let user_id = Uuid::new_v4();
        let auth: UserAuth = UserAuthData { user_id }.into();
        assert_eq!(auth.user_id, user_id);
    }
}
