//! Capacity math, live pricing and booking status resolution.
//!
//! All functions here operate on snapshots handed in by the caller. The
//! persistence layer loads the rows, the API layer holds the per-ride lock;
//! nothing in this module touches the database.

use thiserror::Error;

use crate::models::capacity::CapacityLimits;
use crate::models::contribution::{Contribution, ContributionStatus, SeatRequest};
use crate::models::pool::{PoolStatus, PoolTotals, RidePool};
use crate::models::profile::Profile;
use crate::models::ride::Ride;

/// Fare assumed when the host never supplied an estimate, in major units.
pub const FALLBACK_FARE_MAJOR: f64 = 25.0;

/// Minimum collected amount, in minor units, below which confirm-booked is
/// rejected outright rather than settled.
pub const MIN_COLLECTED_FOR_PAYOUT_MINOR: i64 = 50;

/// Capacity left on a ride after the host's own party and all paid
/// contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RemainingCapacity {
    pub seats: i32,
    /// `None` means the kind is unconstrained for this vehicle class.
    pub backpacks: Option<i32>,
    pub small_items: Option<i32>,
    pub large_items: Option<i32>,
    /// Remaining pooled luggage allowance, when the ride declares one.
    pub total_items: Option<i32>,
}

/// A seat request that does not fit the remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("requested {requested} seats but only {remaining} remain")]
    ExceedsSeats { requested: i32, remaining: i32 },
    #[error("requested {requested} {kind} but only {remaining} remain")]
    ExceedsLuggage {
        kind: &'static str,
        requested: i32,
        remaining: i32,
    },
}

/// Computes what is still free on a ride given the paid totals.
///
/// Host seats and luggage count against the vehicle limits but not against
/// the pool's paid totals; the host never pays into their own pool through a
/// contribution row with seats.
pub fn remaining_capacity(ride: &Ride, paid: &PoolTotals) -> RemainingCapacity {
    let limits: CapacityLimits = ride.vehicle_class.limits();

    let seats = (limits.seats - ride.host_seats - paid.seats).max(0);

    let minus_host = |limit: Option<i32>, host: i32, taken: i32| {
        limit.map(|l| (l - host - taken).max(0))
    };

    let total_items = ride.total_items_limit.map(|limit| {
        let host_items = ride.host_backpacks + ride.host_small_items + ride.host_large_items;
        (limit - host_items - paid.total_items()).max(0)
    });

    RemainingCapacity {
        seats,
        backpacks: minus_host(limits.backpacks, ride.host_backpacks, paid.backpacks),
        small_items: minus_host(limits.small_items, ride.host_small_items, paid.small_items),
        large_items: minus_host(limits.large_items, ride.host_large_items, paid.large_items),
        total_items,
    }
}

/// Checks a seat request against remaining capacity.
///
/// Per-kind limits are checked where the vehicle declares them; the pooled
/// total-items limit is checked whenever the ride declares one, which is the
/// only luggage constraint for classes without per-kind limits.
pub fn validate_seat_request(
    request: &SeatRequest,
    remaining: &RemainingCapacity,
) -> Result<(), CapacityError> {
    if request.seats > remaining.seats {
        return Err(CapacityError::ExceedsSeats {
            requested: request.seats,
            remaining: remaining.seats,
        });
    }

    let kinds = [
        ("backpacks", request.backpacks, remaining.backpacks),
        ("small_items", request.small_items, remaining.small_items),
        ("large_items", request.large_items, remaining.large_items),
    ];
    for (kind, requested, limit) in kinds {
        if let Some(left) = limit {
            if requested > left {
                return Err(CapacityError::ExceedsLuggage {
                    kind,
                    requested,
                    remaining: left,
                });
            }
        }
    }

    if let Some(left) = remaining.total_items {
        if request.total_items() > left {
            return Err(CapacityError::ExceedsLuggage {
                kind: "total_items",
                requested: request.total_items(),
                remaining: left,
            });
        }
    }

    Ok(())
}

/// Live per-seat price in minor units.
///
/// The estimate is split across the host's party and every seat already paid
/// for, so the price per seat falls as the pool fills. Never returns less
/// than one minor unit.
pub fn per_seat_minor(estimate_minor: i64, host_seats: i32, paid_seats: i32) -> i64 {
    let occupied = i64::from(host_seats) + i64::from(paid_seats);
    let divisor = occupied.max(1);
    let share = (estimate_minor as f64 / divisor as f64).round() as i64;
    share.max(1)
}

/// The fare estimate used for pricing, in minor units.
pub fn estimate_minor(ride: &Ride) -> i64 {
    shared::money::to_minor(ride.estimated_fare.unwrap_or(FALLBACK_FARE_MAJOR))
}

/// Coarse booking status shown on ride listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Unpaid,
    Pending,
    Confirmed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Unpaid => "unpaid",
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Canceled => "canceled",
        }
    }
}

/// Resolves the pool-wide coarse booking status from its contributions.
///
/// Cancellation wins over everything. The pool reads as confirmed once the
/// host's own contribution is paid and at least two seats are paid in total;
/// any paid seat short of that is pending; a pool with no money in it yet is
/// unpaid.
pub fn coarse_status(pool: &RidePool, contributions: &[Contribution]) -> BookingStatus {
    if pool.status == PoolStatus::Canceled {
        return BookingStatus::Canceled;
    }

    let paid = contributions
        .iter()
        .filter(|c| c.status == ContributionStatus::Paid);
    let mut host_paid = false;
    let mut paid_seats = 0i64;
    for c in paid {
        host_paid |= c.is_host;
        paid_seats += i64::from(c.seats);
    }

    if host_paid && paid_seats >= 2 {
        return BookingStatus::Confirmed;
    }
    if paid_seats > 0 {
        return BookingStatus::Pending;
    }
    BookingStatus::Unpaid
}

/// A reason confirm-booked cannot settle the booker payout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    #[error("collected user share of {collected} is below the {minimum} minor unit payout minimum")]
    BelowMinimum { collected: i64, minimum: i64 },
    #[error("the booker has no verified payout account")]
    NoPayoutAccount,
}

/// Checks everything that must hold before a booker payout transfer is
/// created. Called before the pool is marked booked, so a failed payout
/// leaves the pool in a retryable state.
pub fn validate_payout_preconditions(
    collected_minor: i64,
    booker: Option<&Profile>,
) -> Result<(), PayoutError> {
    if collected_minor < MIN_COLLECTED_FOR_PAYOUT_MINOR {
        return Err(PayoutError::BelowMinimum {
            collected: collected_minor,
            minimum: MIN_COLLECTED_FOR_PAYOUT_MINOR,
        });
    }
    match booker {
        Some(profile) if profile.can_receive_payouts() => Ok(()),
        _ => Err(PayoutError::NoPayoutAccount),
    }
}

/// What the aggregator should write back after recomputing paid totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateDecision {
    pub totals: PoolTotals,
    pub status: PoolStatus,
}

/// Recomputes a pool's cached aggregates and early-stage status.
///
/// While the pool is still early (collecting or bookable) the status tracks
/// the funding quorum in both directions. From checking-in onward the status
/// is owned by the check-in and booking flows and is never regressed here,
/// even if refunds drop the paid seat count below quorum.
pub fn aggregate(pool: &RidePool, contributions: &[Contribution]) -> AggregateDecision {
    let totals = PoolTotals::from_contributions(contributions);

    let status = if pool.status.is_early() {
        let quorum = crate::models::pool::funding_quorum(pool.min_contributors);
        if totals.seats >= quorum {
            PoolStatus::Bookable
        } else {
            PoolStatus::Collecting
        }
    } else {
        pool.status
    };

    AggregateDecision { totals, status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capacity::VehicleClass;
    use crate::models::ride::RideStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn ride(class: VehicleClass, host_seats: i32) -> Ride {
        Ride {
            id: Uuid::new_v4(),
            host_user_id: Uuid::new_v4(),
            origin_name: "Airport".to_string(),
            origin_lat: 51.47,
            origin_lng: -0.45,
            destination_name: "City Centre".to_string(),
            destination_lat: 51.51,
            destination_lng: -0.12,
            departs_at: Utc::now(),
            host_seats,
            host_backpacks: 1,
            host_small_items: 0,
            host_large_items: 0,
            total_items_limit: None,
            vehicle_class: class,
            estimated_fare: Some(40.0),
            status: RideStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pool(status: PoolStatus, min_contributors: i32) -> RidePool {
        RidePool {
            id: Uuid::new_v4(),
            ride_id: Uuid::new_v4(),
            currency: "gbp".to_string(),
            status,
            min_contributors,
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

    fn paid_contribution(seats: i32) -> Contribution {
        Contribution {
            id: Uuid::new_v4(),
            pool_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            currency: "gbp".to_string(),
            user_share_minor: 1000,
            platform_fee_minor: 50,
            seats,
            backpacks: 0,
            small_items: 0,
            large_items: 0,
            status: ContributionStatus::Paid,
            is_host: false,
            payment_ref: None,
            checked_in_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(seats: i32) -> SeatRequest {
        SeatRequest {
            seats,
            backpacks: 0,
            small_items: 0,
            large_items: 0,
        }
    }

    #[test]
    fn test_remaining_seats_subtract_host_and_paid() {
        let ride = ride(VehicleClass::Regular, 1);
        let paid = PoolTotals {
            seats: 2,
            ..Default::default()
        };
        let remaining = remaining_capacity(&ride, &paid);
        assert_eq!(remaining.seats, 1);
    }

    #[test]
    fn test_remaining_seats_never_negative() {
        let ride = ride(VehicleClass::Regular, 4);
        let paid = PoolTotals {
            seats: 3,
            ..Default::default()
        };
        assert_eq!(remaining_capacity(&ride, &paid).seats, 0);
    }

    #[test]
    fn test_remaining_luggage_subtracts_host_items() {
        let ride = ride(VehicleClass::Regular, 1);
        let remaining = remaining_capacity(&ride, &PoolTotals::default());
        // Regular allows 4 backpacks, host brings 1.
        assert_eq!(remaining.backpacks, Some(3));
        assert_eq!(remaining.small_items, Some(2));
        assert_eq!(remaining.large_items, Some(2));
    }

    #[test]
    fn test_minibus_uses_pooled_limit_only() {
        let mut ride = ride(VehicleClass::Minibus, 2);
        ride.total_items_limit = Some(10);
        let paid = PoolTotals {
            backpacks: 3,
            small_items: 2,
            large_items: 1,
            ..Default::default()
        };
        let remaining = remaining_capacity(&ride, &paid);
        assert_eq!(remaining.backpacks, None);
        assert_eq!(remaining.small_items, None);
        assert_eq!(remaining.large_items, None);
        // 10 - host's 1 backpack - 6 paid items.
        assert_eq!(remaining.total_items, Some(3));
    }

    #[test]
    fn test_validate_rejects_seat_overflow() {
        let remaining = RemainingCapacity {
            seats: 1,
            backpacks: Some(2),
            small_items: Some(2),
            large_items: Some(2),
            total_items: None,
        };
        let err = validate_seat_request(&request(2), &remaining).unwrap_err();
        assert_eq!(
            err,
            CapacityError::ExceedsSeats {
                requested: 2,
                remaining: 1
            }
        );
    }

    #[test]
    fn test_validate_rejects_luggage_overflow() {
        let remaining = RemainingCapacity {
            seats: 3,
            backpacks: Some(1),
            small_items: Some(2),
            large_items: Some(0),
            total_items: None,
        };
        let req = SeatRequest {
            seats: 1,
            backpacks: 0,
            small_items: 0,
            large_items: 1,
        };
        let err = validate_seat_request(&req, &remaining).unwrap_err();
        assert_eq!(
            err,
            CapacityError::ExceedsLuggage {
                kind: "large_items",
                requested: 1,
                remaining: 0
            }
        );
    }

    #[test]
    fn test_validate_enforces_pooled_total() {
        let remaining = RemainingCapacity {
            seats: 5,
            backpacks: None,
            small_items: None,
            large_items: None,
            total_items: Some(2),
        };
        let req = SeatRequest {
            seats: 1,
            backpacks: 1,
            small_items: 1,
            large_items: 1,
        };
        let err = validate_seat_request(&req, &remaining).unwrap_err();
        assert_eq!(
            err,
            CapacityError::ExceedsLuggage {
                kind: "total_items",
                requested: 3,
                remaining: 2
            }
        );
    }

    #[test]
    fn test_validate_accepts_exact_fit() {
        let remaining = RemainingCapacity {
            seats: 2,
            backpacks: Some(1),
            small_items: Some(0),
            large_items: Some(1),
            total_items: None,
        };
        let req = SeatRequest {
            seats: 2,
            backpacks: 1,
            small_items: 0,
            large_items: 1,
        };
        assert!(validate_seat_request(&req, &remaining).is_ok());
    }

    #[test]
    fn test_per_seat_price_falls_as_pool_fills() {
        // 40.00 split across host + paid seats.
        assert_eq!(per_seat_minor(4000, 1, 0), 4000);
        assert_eq!(per_seat_minor(4000, 1, 1), 2000);
        assert_eq!(per_seat_minor(4000, 1, 3), 1000);
    }

    #[test]
    fn test_per_seat_price_rounds_half_up() {
        assert_eq!(per_seat_minor(1000, 0, 3), 333);
        assert_eq!(per_seat_minor(1001, 0, 2), 501);
    }

    #[test]
    fn test_per_seat_price_floors() {
        assert_eq!(per_seat_minor(0, 1, 0), 1);
        assert_eq!(per_seat_minor(1, 0, 0), 1);
        // Zero occupied seats still divides by one.
        assert_eq!(per_seat_minor(500, 0, 0), 500);
    }

    #[test]
    fn test_estimate_falls_back_when_absent() {
        let mut r = ride(VehicleClass::Regular, 1);
        r.estimated_fare = None;
        assert_eq!(estimate_minor(&r), 2500);
        r.estimated_fare = Some(33.33);
        assert_eq!(estimate_minor(&r), 3333);
    }

    fn host_paid_contribution(seats: i32) -> Contribution {
        let mut c = paid_contribution(seats);
        c.is_host = true;
        c
    }

    #[test]
    fn test_coarse_status_canceled_pool_wins() {
        let p = pool(PoolStatus::Canceled, 2);
        let rows = [host_paid_contribution(1), paid_contribution(1)];
        assert_eq!(coarse_status(&p, &rows), BookingStatus::Canceled);
        assert_eq!(coarse_status(&p, &[]), BookingStatus::Canceled);
    }

    #[test]
    fn test_coarse_status_host_paid_plus_two_seats_is_confirmed() {
        let p = pool(PoolStatus::Booking, 2);
        let rows = [host_paid_contribution(1), paid_contribution(1)];
        assert_eq!(coarse_status(&p, &rows), BookingStatus::Confirmed);
    }

    #[test]
    fn test_coarse_status_paid_seats_without_host_is_pending() {
        // Two passengers paid but the host's own contribution has not; the
        // pool is not yet confirmed even though it is bookable.
        let p = pool(PoolStatus::Bookable, 2);
        let rows = [paid_contribution(1), paid_contribution(1)];
        assert_eq!(coarse_status(&p, &rows), BookingStatus::Pending);
    }

    #[test]
    fn test_coarse_status_host_paid_alone_is_pending() {
        let p = pool(PoolStatus::Collecting, 2);
        let rows = [host_paid_contribution(1)];
        assert_eq!(coarse_status(&p, &rows), BookingStatus::Pending);
    }

    #[test]
    fn test_coarse_status_no_paid_money_is_unpaid() {
        let p = pool(PoolStatus::Bookable, 2);
        assert_eq!(coarse_status(&p, &[]), BookingStatus::Unpaid);

        let mut pending = paid_contribution(1);
        pending.status = ContributionStatus::Pending;
        assert_eq!(coarse_status(&p, &[pending]), BookingStatus::Unpaid);
    }

    fn booker(enabled: bool, account: Option<&str>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            display_name: "Booker".to_string(),
            email: None,
            payout_account_id: account.map(String::from),
            payouts_enabled: enabled,
            is_admin: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payout_rejected_below_minimum() {
        let b = booker(true, Some("acct_1"));
        let err = validate_payout_preconditions(49, Some(&b)).unwrap_err();
        assert_eq!(
            err,
            PayoutError::BelowMinimum {
                collected: 49,
                minimum: MIN_COLLECTED_FOR_PAYOUT_MINOR
            }
        );
    }

    #[test]
    fn test_payout_rejected_without_booker_profile() {
        let err = validate_payout_preconditions(5000, None).unwrap_err();
        assert_eq!(err, PayoutError::NoPayoutAccount);
    }

    #[test]
    fn test_payout_rejected_when_payouts_disabled() {
        let b = booker(false, Some("acct_1"));
        assert_eq!(
            validate_payout_preconditions(5000, Some(&b)).unwrap_err(),
            PayoutError::NoPayoutAccount
        );

        let b = booker(true, None);
        assert_eq!(
            validate_payout_preconditions(5000, Some(&b)).unwrap_err(),
            PayoutError::NoPayoutAccount
        );
    }

    #[test]
    fn test_payout_allowed_at_minimum_with_verified_account() {
        let b = booker(true, Some("acct_1"));
        assert!(validate_payout_preconditions(MIN_COLLECTED_FOR_PAYOUT_MINOR, Some(&b)).is_ok());
    }

    #[test]
    fn test_aggregate_promotes_at_quorum() {
        let p = pool(PoolStatus::Collecting, 2);
        let decision = aggregate(&p, &[paid_contribution(1), paid_contribution(1)]);
        assert_eq!(decision.status, PoolStatus::Bookable);
        assert_eq!(decision.totals.seats, 2);
    }

    #[test]
    fn test_aggregate_demotes_below_quorum_while_early() {
        let p = pool(PoolStatus::Bookable, 2);
        let decision = aggregate(&p, &[paid_contribution(1)]);
        assert_eq!(decision.status, PoolStatus::Collecting);
    }

    #[test]
    fn test_aggregate_never_regresses_past_checking_in() {
        for status in [
            PoolStatus::CheckingIn,
            PoolStatus::ReadyToBook,
            PoolStatus::Booking,
            PoolStatus::Booked,
            PoolStatus::Paid,
        ] {
            let p = pool(status, 2);
            let decision = aggregate(&p, &[]);
            assert_eq!(decision.status, status, "{status} must hold");
        }
    }

    #[test]
    fn test_aggregate_honours_raised_quorum() {
        let p = pool(PoolStatus::Collecting, 4);
        let decision = aggregate(&p, &[paid_contribution(3)]);
        assert_eq!(decision.status, PoolStatus::Collecting);

        let decision = aggregate(&p, &[paid_contribution(3), paid_contribution(1)]);
        assert_eq!(decision.status, PoolStatus::Bookable);
    }
}
