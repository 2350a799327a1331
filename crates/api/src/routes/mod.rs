//! HTTP route handlers.

pub mod health;
pub mod payments;
pub mod pools;
pub mod profiles;
pub mod rides;
