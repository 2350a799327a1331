//! Ride domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::capacity::VehicleClass;

/// Lifecycle status of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Active,
    Deleted,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Active => "active",
            RideStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RideStatus::Active),
            "deleted" => Ok(RideStatus::Deleted),
            _ => Err(format!("Invalid ride status: {}", s)),
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A journey offered by a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Ride {
    pub id: Uuid,
    pub host_user_id: Uuid,
    pub origin_name: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_name: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub departs_at: DateTime<Utc>,
    /// Seats the host reserves for their own party.
    pub host_seats: i32,
    pub host_backpacks: i32,
    pub host_small_items: i32,
    pub host_large_items: i32,
    /// Optional pooled luggage limit, used when the vehicle class declares no
    /// per-kind limits.
    pub total_items_limit: Option<i32>,
    pub vehicle_class: VehicleClass,
    /// Estimated fare in major currency units, as quoted by the host.
    pub estimated_fare: Option<f64>,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn is_active(&self) -> bool {
        self.status == RideStatus::Active
    }
}

/// Request to publish a new ride.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateRideRequest {
    #[validate(length(min = 1, max = 200, message = "origin_name must be 1-200 characters"))]
    pub origin_name: String,

    #[validate(range(min = -90.0, max = 90.0, message = "origin_lat out of range"))]
    pub origin_lat: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "origin_lng out of range"))]
    pub origin_lng: f64,

    #[validate(length(
        min = 1,
        max = 200,
        message = "destination_name must be 1-200 characters"
    ))]
    pub destination_name: String,

    #[validate(range(min = -90.0, max = 90.0, message = "destination_lat out of range"))]
    pub destination_lat: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "destination_lng out of range"))]
    pub destination_lng: f64,

    pub departs_at: DateTime<Utc>,

    #[validate(range(min = 1, max = 16, message = "seats must be between 1 and 16"))]
    pub seats: i32,

    #[validate(range(min = 0, max = 20, message = "backpacks must be between 0 and 20"))]
    #[serde(default)]
    pub backpacks: i32,

    #[validate(range(min = 0, max = 20, message = "small_items must be between 0 and 20"))]
    #[serde(default)]
    pub small_items: i32,

    #[validate(range(min = 0, max = 20, message = "large_items must be between 0 and 20"))]
    #[serde(default)]
    pub large_items: i32,

    #[validate(range(min = 1, max = 40, message = "total_items_limit must be between 1 and 40"))]
    pub total_items_limit: Option<i32>,

    /// Defaults to `regular` when omitted.
    pub vehicle_class: Option<VehicleClass>,

    #[validate(range(min = 0.01, message = "estimated_fare must be positive"))]
    pub estimated_fare: Option<f64>,
}

/// Request to edit a ride. Only allowed for the host while no passenger
/// contribution exists.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateRideRequest {
    pub departs_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 16, message = "seats must be between 1 and 16"))]
    pub seats: Option<i32>,

    #[validate(range(min = 0, max = 20, message = "backpacks must be between 0 and 20"))]
    pub backpacks: Option<i32>,

    #[validate(range(min = 0, max = 20, message = "small_items must be between 0 and 20"))]
    pub small_items: Option<i32>,

    #[validate(range(min = 0, max = 20, message = "large_items must be between 0 and 20"))]
    pub large_items: Option<i32>,

    pub vehicle_class: Option<VehicleClass>,

    #[validate(range(min = 0.01, message = "estimated_fare must be positive"))]
    pub estimated_fare: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateRideRequest {
        CreateRideRequest {
            origin_name: "Airport".to_string(),
            origin_lat: 51.47,
            origin_lng: -0.45,
            destination_name: "City Centre".to_string(),
            destination_lat: 51.51,
            destination_lng: -0.12,
            departs_at: Utc::now(),
            seats: 1,
            backpacks: 1,
            small_items: 0,
            large_items: 1,
            total_items_limit: None,
            vehicle_class: Some(VehicleClass::Regular),
            estimated_fare: Some(42.50),
        }
    }

    #[test]
    fn test_create_request_valid() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_zero_seats() {
        let mut req = valid_request();
        req.seats = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_out_of_range_coordinates() {
        let mut req = valid_request();
        req.origin_lat = 91.0;
        assert!(req.validate().is_err());

        let mut req = valid_request();
        req.destination_lng = -181.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_empty_origin() {
        let mut req = valid_request();
        req.origin_name = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_negative_fare() {
        let mut req = valid_request();
        req.estimated_fare = Some(-1.0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_update_request_all_optional() {
        let req = UpdateRideRequest {
            departs_at: None,
            seats: None,
            backpacks: None,
            small_items: None,
            large_items: None,
            vehicle_class: None,
            estimated_fare: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_ride_status_round_trip() {
        assert_eq!("active".parse::<RideStatus>(), Ok(RideStatus::Active));
        assert_eq!("deleted".parse::<RideStatus>(), Ok(RideStatus::Deleted));
        assert!("archived".parse::<RideStatus>().is_err());
    }
}
