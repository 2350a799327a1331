//! Domain layer for the RidePool backend.
//!
//! This crate contains:
//! - Domain models (Ride, RidePool, Contribution, BookerPayout, Profile)
//! - The pool status state machine and its transition rules
//! - Pure business logic: capacity math, live pricing, booker handoff rules

pub mod models;
pub mod services;
