//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user known to the platform. Identity comes from the JWT issuer; this row
/// carries contact details and payout readiness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    /// Payment provider account for receiving booker payouts.
    pub payout_account_id: Option<String>,
    pub payouts_enabled: bool,
    /// Grants ride cancellation on behalf of any host.
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// True when a booker payout transfer can actually be created for this
    /// user.
    pub fn can_receive_payouts(&self) -> bool {
        self.payouts_enabled && self.payout_account_id.is_some()
    }
}
