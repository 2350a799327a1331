//! Application services.

pub mod aggregator;
pub mod cancellation;
pub mod email;
pub mod payments;
