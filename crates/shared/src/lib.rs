//! Shared utilities and common types for the RidePool backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Money arithmetic in minor currency units
//! - Check-in code generation
//! - JWT verification helpers
//! - Pagination types

pub mod code;
pub mod jwt;
pub mod money;
pub mod pagination;
