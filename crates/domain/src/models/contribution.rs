//! Passenger contribution models.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// How long a pending contribution reserves capacity before it lapses, in
/// seconds.
pub const SEAT_LOCK_TTL_SECS: i64 = 300;

lazy_static! {
    static ref CHECKIN_CODE_RE: Regex = Regex::new(r"^[0-9]{4,10}$").unwrap();
}

/// Payment status of a single passenger's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionStatus {
    /// Seat lock taken, checkout not completed.
    Pending,
    /// Payment authorized but not captured.
    Authorized,
    /// Payment captured. Only paid contributions reserve capacity.
    Paid,
    /// Lapsed or withdrawn before capture.
    Canceled,
    /// Captured payment returned during pool cancellation.
    Refunded,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::Authorized => "authorized",
            ContributionStatus::Paid => "paid",
            ContributionStatus::Canceled => "canceled",
            ContributionStatus::Refunded => "refunded",
        }
    }

    /// True when cancellation must return money: captured payments are
    /// refunded, authorizations are released.
    pub fn is_refundable(&self) -> bool {
        matches!(self, ContributionStatus::Authorized | ContributionStatus::Paid)
    }
}

impl FromStr for ContributionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ContributionStatus::Pending),
            "authorized" => Ok(ContributionStatus::Authorized),
            "paid" => Ok(ContributionStatus::Paid),
            "canceled" => Ok(ContributionStatus::Canceled),
            "refunded" => Ok(ContributionStatus::Refunded),
            _ => Err(format!("Invalid contribution status: {}", s)),
        }
    }
}

impl fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One passenger's stake in a pool. At most one per (pool, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Contribution {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    /// Fare share in minor units, excluding the platform fee.
    pub user_share_minor: i64,
    pub platform_fee_minor: i64,
    pub seats: i32,
    pub backpacks: i32,
    pub small_items: i32,
    pub large_items: i32,
    pub status: ContributionStatus,
    pub is_host: bool,
    /// Payment provider reference for the checkout session or charge.
    pub payment_ref: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contribution {
    pub fn is_checked_in(&self) -> bool {
        self.checked_in_at.is_some()
    }
}

/// When a pending contribution created at `created_at` stops reserving
/// capacity.
pub fn seat_lock_expires_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::seconds(SEAT_LOCK_TTL_SECS)
}

/// Request to lock seats in a pool ahead of checkout.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SeatRequest {
    #[validate(range(min = 1, max = 8, message = "seats must be between 1 and 8"))]
    pub seats: i32,

    #[validate(range(min = 0, max = 10, message = "backpacks must be between 0 and 10"))]
    #[serde(default)]
    pub backpacks: i32,

    #[validate(range(min = 0, max = 10, message = "small_items must be between 0 and 10"))]
    #[serde(default)]
    pub small_items: i32,

    #[validate(range(min = 0, max = 10, message = "large_items must be between 0 and 10"))]
    #[serde(default)]
    pub large_items: i32,
}

impl SeatRequest {
    pub fn total_items(&self) -> i32 {
        self.backpacks + self.small_items + self.large_items
    }
}

/// Request to check in with the pool's active code.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckInRequest {
    #[validate(regex(path = *CHECKIN_CODE_RE, message = "code must be 4-10 digits"))]
    pub code: String,
}
