//! Booker payout records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Status of a transfer of collected fare shares to the booker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Sent,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Sent => "sent",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PayoutStatus::Pending),
            "sent" => Ok(PayoutStatus::Sent),
            "failed" => Ok(PayoutStatus::Failed),
            _ => Err(format!("Invalid payout status: {}", s)),
        }
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transfer of a pool's collected fare shares to the booker who paid the
/// driver. At most one per pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BookerPayout {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub booker_user_id: Uuid,
    pub currency: String,
    /// Sum of collected user shares, excluding platform fees.
    pub amount_minor: i64,
    pub status: PayoutStatus,
    /// Payment provider transfer reference, set once the transfer is created.
    pub transfer_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_status_round_trip() {
        for status in [PayoutStatus::Pending, PayoutStatus::Sent, PayoutStatus::Failed] {
            assert_eq!(status.to_string().parse::<PayoutStatus>(), Ok(status));
        }
        assert!("queued".parse::<PayoutStatus>().is_err());
    }
}
