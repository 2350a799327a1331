//! Pure business logic, kept free of I/O so it can be tested directly.

pub mod booking;
pub mod handoff;
