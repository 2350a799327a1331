//! Repository implementations for database operations.

pub mod contribution;
pub mod payout;
pub mod pool;
pub mod profile;
pub mod ride;

pub use contribution::{ContributionRepository, SeatLockInput};
pub use payout::PayoutRepository;
pub use pool::{PoolAggregateUpdate, PoolRepository};
pub use profile::{ProfileInput, ProfileRepository};
pub use ride::{RideInput, RideRepository, RideUpdateInput};
