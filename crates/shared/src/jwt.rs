//! JWT verification helpers.
//!
//! Token issuance is handled by the external identity service; this backend only
//! verifies Bearer tokens it receives. HS256 with a shared secret, matching what
//! the identity service signs with.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,
}

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Default leeway in seconds for clock skew tolerance.
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Configuration for JWT verification.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    /// Leeway in seconds for clock skew tolerance.
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("leeway_secs", &self.leeway_secs)
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtVerifier {
    /// Creates a verifier from the shared HS256 secret.
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    /// Creates a verifier with a custom clock-skew leeway.
    pub fn with_leeway(secret: &str, leeway_secs: u64) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            leeway_secs,
        }
    }

    /// Validates a token and returns its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            })?;

        Ok(token_data.claims)
    }
}

/// Extracts the user ID from validated claims.
pub fn extract_user_id(claims: &Claims) -> Result<Uuid, JwtError> {
    Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)
}

/// Signs a token for the given user. Used by tests and local tooling; production
/// tokens come from the identity service.
pub fn issue_token(secret: &str, user_id: Uuid, expiry_secs: i64) -> Result<String, JwtError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::EncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_for_jwt_testing_12345";

    fn strict_verifier() -> JwtVerifier {
        JwtVerifier::with_leeway(SECRET, 0)
    }

    #[test]
    fn test_issue_and_validate() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, user_id, 3600).unwrap();

        let claims = strict_verifier().validate(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_rejected() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, user_id, -60).unwrap();

        let result = strict_verifier().validate(&token);
        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), 3600).unwrap();
        let verifier = JwtVerifier::with_leeway("a-different-secret", 0);

        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(strict_verifier().validate("not_a_jwt").is_err());
        assert!(strict_verifier().validate("a.b.c").is_err());
    }

    #[test]
    fn test_extract_user_id() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, user_id, 3600).unwrap();
        let claims = strict_verifier().validate(&token).unwrap();

        assert_eq!(extract_user_id(&claims).unwrap(), user_id);
    }

    #[test]
    fn test_extract_user_id_non_uuid_subject() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            exp: 0,
            iat: 0,
        };
        assert!(matches!(
            extract_user_id(&claims),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_default_leeway() {
        let verifier = JwtVerifier::new(SECRET);
        assert_eq!(verifier.leeway_secs, DEFAULT_LEEWAY_SECS);
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", JwtVerifier::new(SECRET));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(SECRET));
    }
}
