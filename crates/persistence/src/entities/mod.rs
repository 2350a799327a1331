//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod contribution;
pub mod payout;
pub mod pool;
pub mod profile;
pub mod ride;

pub use contribution::ContributionEntity;
pub use payout::BookerPayoutEntity;
pub use pool::RidePoolEntity;
pub use profile::ProfileEntity;
pub use ride::RideEntity;
