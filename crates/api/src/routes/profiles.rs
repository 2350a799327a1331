//! Profile endpoint handlers.
//!
//! Identity lives in the external token issuer; these endpoints let a signed-in
//! user register the contact and payout details this backend needs for
//! notifications, admin checks and booker payouts.

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use domain::models::Profile;
use persistence::repositories::{ProfileInput, ProfileRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Request payload for creating or refreshing the caller's profile.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[validate(email)]
    pub email: Option<String>,
}

/// Request payload for registering a payout account.
#[derive(Debug, Deserialize, Validate)]
pub struct PayoutAccountRequest {
    /// Payment provider account that receives booker payouts.
    #[validate(length(min = 1, max = 255))]
    pub payout_account_id: String,
    /// Whether the provider has cleared the account for transfers.
    pub payouts_enabled: Option<bool>,
}

/// Fetch the caller's profile.
///
/// GET /api/v1/me
pub async fn get_me(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Profile>, ApiError> {
    let profiles = ProfileRepository::new(state.pool.clone());
    let profile: Profile = profiles
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?
        .into();
    Ok(Json(profile))
}

/// Create or refresh the caller's profile.
///
/// PUT /api/v1/me
pub async fn upsert_me(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<UpsertProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    request.validate()?;

    let profiles = ProfileRepository::new(state.pool.clone());
    let profile: Profile = profiles
        .upsert(ProfileInput {
            id: auth.user_id,
            display_name: request.display_name,
            email: request.email,
        })
        .await?
        .into();

    info!(user_id = %auth.user_id, "Profile upserted");
    Ok(Json(profile))
}

/// Register the caller's payout account.
///
/// PUT /api/v1/me/payout-account
pub async fn set_payout_account(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<PayoutAccountRequest>,
) -> Result<Json<Profile>, ApiError> {
    request.validate()?;

    let profiles = ProfileRepository::new(state.pool.clone());
    let profile: Profile = profiles
        .set_payout_account(
            auth.user_id,
            &request.payout_account_id,
            request.payouts_enabled.unwrap_or(true),
        )
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Profile not found, create it before adding a payout account".into())
        })?
        .into();

    info!(user_id = %auth.user_id, "Payout account registered");
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_request_validation() {
        let valid = UpsertProfileRequest {
            display_name: "Rider".to_string(),
            email: Some("rider@example.com".to_string()),
        };
        assert!(valid.validate().is_ok());

        let empty_name = UpsertProfileRequest {
            display_name: String::new(),
            email: None,
        };
        assert!(empty_name.validate().is_err());

        let bad_email = UpsertProfileRequest {
            display_name: "Rider".to_string(),
            email: Some("not-an-address".to_string()),
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_payout_account_request_validation() {
        let valid = PayoutAccountRequest {
            payout_account_id: "acct_123".to_string(),
            payouts_enabled: None,
        };
        assert!(valid.validate().is_ok());

        let empty = PayoutAccountRequest {
            payout_account_id: String::new(),
            payouts_enabled: Some(true),
        };
        assert!(empty.validate().is_err());
    }
}
