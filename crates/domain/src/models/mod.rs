//! Domain model definitions.

pub mod capacity;
pub mod contribution;
pub mod payout;
pub mod pool;
pub mod profile;
pub mod ride;

pub use capacity::{CapacityLimits, VehicleClass};
pub use contribution::{
    seat_lock_expires_at, CheckInRequest, Contribution, ContributionStatus, SeatRequest,
    SEAT_LOCK_TTL_SECS,
};
pub use payout::{BookerPayout, PayoutStatus};
pub use pool::{
    effective_claim_grace, effective_code_ttl, funding_quorum, PoolStatus, PoolTotals, RidePool,
};
pub use profile::Profile;
pub use ride::{CreateRideRequest, Ride, RideStatus, UpdateRideRequest};
