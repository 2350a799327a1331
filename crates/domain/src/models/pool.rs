//! Ride pool domain models and the pool status state machine.
//!
//! A pool is the funding/coordination unit tying a ride to its passengers'
//! payments and check-ins. Every mutating endpoint consults
//! [`PoolStatus::can_transition`] instead of re-deriving which statuses it
//! accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::contribution::{Contribution, ContributionStatus};

/// Minimum effective check-in code TTL in seconds.
pub const CODE_TTL_MIN_SECS: i64 = 120;
/// Maximum effective check-in code TTL in seconds.
pub const CODE_TTL_MAX_SECS: i64 = 1800;
/// Default check-in code TTL in seconds.
pub const CODE_TTL_DEFAULT_SECS: i64 = 600;

/// Minimum grace period before the booker role can be claimed, in seconds.
pub const CLAIM_GRACE_MIN_SECS: i64 = 60;
/// Maximum grace period before the booker role can be claimed, in seconds.
pub const CLAIM_GRACE_MAX_SECS: i64 = 600;
/// Default grace period before the booker role can be claimed, in seconds.
pub const CLAIM_GRACE_DEFAULT_SECS: i64 = 180;

/// Status of a ride pool.
///
/// ```text
/// collecting -> bookable -> checking_in -> ready_to_book -> booking -> booked -> paid
/// any non-final state -> canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Collecting,
    Bookable,
    CheckingIn,
    ReadyToBook,
    Booking,
    Booked,
    Paid,
    Canceled,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Collecting => "collecting",
            PoolStatus::Bookable => "bookable",
            PoolStatus::CheckingIn => "checking_in",
            PoolStatus::ReadyToBook => "ready_to_book",
            PoolStatus::Booking => "booking",
            PoolStatus::Booked => "booked",
            PoolStatus::Paid => "paid",
            PoolStatus::Canceled => "canceled",
        }
    }

    /// True for the states in which the aggregator may still move the pool to
    /// `bookable`. Once the pool has progressed past these, a drop in paid
    /// seats must never regress the status.
    pub fn is_early(&self) -> bool {
        matches!(self, PoolStatus::Collecting | PoolStatus::Bookable)
    }

    /// True once the pool has reached a state no transition leaves.
    pub fn is_final(&self) -> bool {
        matches!(self, PoolStatus::Paid | PoolStatus::Canceled)
    }

    /// Centralized transition validation for the pool state machine.
    ///
    /// Re-entering the current state is permitted for non-final states (e.g.
    /// re-issuing a code while already `checking_in`).
    pub fn can_transition(&self, to: PoolStatus) -> bool {
        use PoolStatus::*;

        if *self == to {
            return !self.is_final();
        }

        match (*self, to) {
            (Collecting, Bookable) => true,
            (Bookable, CheckingIn) => true,
            (CheckingIn, ReadyToBook) => true,
            (ReadyToBook, Booking) => true,
            // confirm-booked is allowed before the deep link was opened and
            // even straight from bookable (small in-person groups).
            (Bookable, Booked) | (ReadyToBook, Booked) | (Booking, Booked) => true,
            (Booked, Paid) => true,
            (Collecting | Bookable | CheckingIn | ReadyToBook | Booking, Canceled) => true,
            _ => false,
        }
    }
}

impl FromStr for PoolStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "collecting" => Ok(PoolStatus::Collecting),
            "bookable" => Ok(PoolStatus::Bookable),
            "checking_in" => Ok(PoolStatus::CheckingIn),
            "ready_to_book" => Ok(PoolStatus::ReadyToBook),
            "booking" => Ok(PoolStatus::Booking),
            "booked" => Ok(PoolStatus::Booked),
            "paid" => Ok(PoolStatus::Paid),
            "canceled" => Ok(PoolStatus::Canceled),
            _ => Err(format!("Invalid pool status: {}", s)),
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The funding/coordination unit for a ride. Exactly one per ride, lazily
/// created on first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RidePool {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub currency: String,
    pub status: PoolStatus,
    /// Quorum of checked-in paid contributors required to book.
    pub min_contributors: i32,
    // Denormalized aggregates, recomputed from paid contributions.
    pub reserved_seats: i32,
    pub reserved_backpacks: i32,
    pub reserved_small_items: i32,
    pub reserved_large_items: i32,
    pub collected_user_share_minor: i64,
    pub collected_platform_fee_minor: i64,
    pub booker_user_id: Uuid,
    pub checkin_code: Option<String>,
    pub code_issued_at: Option<DateTime<Utc>>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RidePool {
    /// True while an issued check-in code has not yet expired.
    pub fn code_active(&self, now: DateTime<Utc>) -> bool {
        match (&self.checkin_code, self.code_expires_at) {
            (Some(_), Some(expires_at)) => now < expires_at,
            _ => false,
        }
    }
}

/// Funding quorum in paid seats: at least two seats, or more if the pool asks
/// for a larger minimum. Applies to the funding stage only; check-in and the
/// booker claim compare against the pool's plain minimum.
pub fn funding_quorum(min_contributors: i32) -> i32 {
    min_contributors.max(2)
}

/// Clamps a requested code TTL into the allowed window, defaulting when absent.
pub fn effective_code_ttl(requested_secs: Option<i64>) -> i64 {
    shared::money::clamp(
        requested_secs.unwrap_or(CODE_TTL_DEFAULT_SECS),
        CODE_TTL_MIN_SECS,
        CODE_TTL_MAX_SECS,
    )
}

/// Clamps a requested claim grace period into the allowed window, defaulting
/// when absent.
pub fn effective_claim_grace(requested_secs: Option<i64>) -> i64 {
    shared::money::clamp(
        requested_secs.unwrap_or(CLAIM_GRACE_DEFAULT_SECS),
        CLAIM_GRACE_MIN_SECS,
        CLAIM_GRACE_MAX_SECS,
    )
}

/// Aggregate totals over a pool's paid contributions.
///
/// These are the only numbers ever written into the pool's cached aggregate
/// columns; they are recomputed from scratch, never incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub seats: i32,
    pub backpacks: i32,
    pub small_items: i32,
    pub large_items: i32,
    pub user_share_minor: i64,
    pub platform_fee_minor: i64,
}

impl PoolTotals {
    /// Sums the paid contributions in the given set. Pending, authorized,
    /// canceled and refunded rows reserve nothing.
    pub fn from_contributions(contributions: &[Contribution]) -> Self {
        let mut totals = PoolTotals::default();
        for c in contributions {
            if c.status != ContributionStatus::Paid {
                continue;
            }
            totals.seats += c.seats;
            totals.backpacks += c.backpacks;
            totals.small_items += c.small_items;
            totals.large_items += c.large_items;
            totals.user_share_minor += c.user_share_minor;
            totals.platform_fee_minor += c.platform_fee_minor;
        }
        totals
    }

    /// Total luggage items of all kinds.
    pub fn total_items(&self) -> i32 {
        self.backpacks + self.small_items + self.large_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn contribution(status: ContributionStatus, seats: i32, share: i64) -> Contribution {
        Contribution {
            id: Uuid::new_v4(),
            pool_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            currency: "gbp".to_string(),
            user_share_minor: share,
            platform_fee_minor: share / 10,
            seats,
            backpacks: 1,
            small_items: 0,
            large_items: 1,
            status,
            is_host: false,
            payment_ref: None,
            checked_in_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        use PoolStatus::*;
        assert!(Collecting.can_transition(Bookable));
        assert!(Bookable.can_transition(CheckingIn));
        assert!(CheckingIn.can_transition(ReadyToBook));
        assert!(ReadyToBook.can_transition(Booking));
        assert!(Booking.can_transition(Booked));
        assert!(Booked.can_transition(Paid));
    }

    #[test]
    fn test_confirm_booked_shortcuts() {
        assert!(PoolStatus::Bookable.can_transition(PoolStatus::Booked));
        assert!(PoolStatus::ReadyToBook.can_transition(PoolStatus::Booked));
    }

    #[test]
    fn test_no_backward_transitions() {
        use PoolStatus::*;
        assert!(!CheckingIn.can_transition(Collecting));
        assert!(!CheckingIn.can_transition(Bookable));
        assert!(!ReadyToBook.can_transition(CheckingIn));
        assert!(!Booked.can_transition(Booking));
        assert!(!Paid.can_transition(Booked));
    }

    #[test]
    fn test_cancellation_reachable_from_non_final_states() {
        use PoolStatus::*;
        for status in [Collecting, Bookable, CheckingIn, ReadyToBook, Booking] {
            assert!(status.can_transition(Canceled), "{status} should cancel");
        }
        assert!(!Booked.can_transition(Canceled));
        assert!(!Paid.can_transition(Canceled));
        assert!(!Canceled.can_transition(Canceled));
    }

    #[test]
    fn test_self_transition_allowed_for_non_final() {
        assert!(PoolStatus::CheckingIn.can_transition(PoolStatus::CheckingIn));
        assert!(PoolStatus::Collecting.can_transition(PoolStatus::Collecting));
        assert!(!PoolStatus::Canceled.can_transition(PoolStatus::Canceled));
    }

    #[test]
    fn test_status_round_trip() {
        use PoolStatus::*;
        for status in [
            Collecting,
            Bookable,
            CheckingIn,
            ReadyToBook,
            Booking,
            Booked,
            Paid,
            Canceled,
        ] {
            assert_eq!(status.to_string().parse::<PoolStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_funding_quorum_floor_of_two() {
        assert_eq!(funding_quorum(0), 2);
        assert_eq!(funding_quorum(1), 2);
        assert_eq!(funding_quorum(2), 2);
        assert_eq!(funding_quorum(5), 5);
    }

    #[test]
    fn test_effective_code_ttl_clamping() {
        assert_eq!(effective_code_ttl(None), CODE_TTL_DEFAULT_SECS);
        assert_eq!(effective_code_ttl(Some(100)), CODE_TTL_MIN_SECS);
        assert_eq!(effective_code_ttl(Some(7200)), CODE_TTL_MAX_SECS);
        assert_eq!(effective_code_ttl(Some(900)), 900);
    }

    #[test]
    fn test_effective_claim_grace_clamping() {
        assert_eq!(effective_claim_grace(None), CLAIM_GRACE_DEFAULT_SECS);
        assert_eq!(effective_claim_grace(Some(10)), CLAIM_GRACE_MIN_SECS);
        assert_eq!(effective_claim_grace(Some(3600)), CLAIM_GRACE_MAX_SECS);
        assert_eq!(effective_claim_grace(Some(240)), 240);
    }

    #[test]
    fn test_totals_count_only_paid() {
        let contributions = vec![
            contribution(ContributionStatus::Paid, 2, 1000),
            contribution(ContributionStatus::Pending, 3, 1500),
            contribution(ContributionStatus::Authorized, 1, 500),
            contribution(ContributionStatus::Refunded, 1, 500),
            contribution(ContributionStatus::Paid, 1, 500),
        ];
        let totals = PoolTotals::from_contributions(&contributions);
        assert_eq!(totals.seats, 3);
        assert_eq!(totals.user_share_minor, 1500);
        assert_eq!(totals.platform_fee_minor, 150);
        assert_eq!(totals.backpacks, 2);
        assert_eq!(totals.total_items(), 4);
    }

    #[test]
    fn test_totals_empty() {
        assert_eq!(PoolTotals::from_contributions(&[]), PoolTotals::default());
    }

    #[test]
    fn test_totals_recompute_is_idempotent() {
        let contributions = vec![
            contribution(ContributionStatus::Paid, 2, 1000),
            contribution(ContributionStatus::Paid, 1, 500),
        ];
        let first = PoolTotals::from_contributions(&contributions);
        let second = PoolTotals::from_contributions(&contributions);
        assert_eq!(first, second);
    }

    #[test]
    fn test_code_active_window() {
        let now = Utc::now();
        let mut pool = sample_pool();
        assert!(!pool.code_active(now), "no code issued yet");

        pool.checkin_code = Some("123456".to_string());
        pool.code_issued_at = Some(now);
        pool.code_expires_at = Some(now + Duration::seconds(120));

        assert!(pool.code_active(now + Duration::seconds(119)));
        assert!(!pool.code_active(now + Duration::seconds(120)), "expires exactly at the boundary");
        assert!(!pool.code_active(now + Duration::seconds(121)));
    }

    fn sample_pool() -> RidePool {
        RidePool {
            id: Uuid::new_v4(),
            ride_id: Uuid::new_v4(),
            currency: "gbp".to_string(),
            status: PoolStatus::Collecting,
            min_contributors: 2,
            reserved_seats: 0,
            reserved_backpacks: 0,
            reserved_small_items: 0,
            reserved_large_items: 0,
            collected_user_share_minor: 0,
            collected_platform_fee_minor: 0,
            booker_user_id: Uuid::new_v4(),
            checkin_code: None,
            code_issued_at: None,
            code_expires_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
