//! Vehicle capacity model.
//!
//! Maps a vehicle class to its seat and luggage limits. Minibuses carry no
//! per-kind luggage limits; their luggage capacity is governed by the ride's
//! pooled total-items limit when one is declared.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Vehicle class a host declares for a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Regular,
    Van,
    Minibus,
}

impl Default for VehicleClass {
    fn default() -> Self {
        VehicleClass::Regular
    }
}

/// Seat and luggage limits for a vehicle class.
///
/// `None` for a luggage kind means the class declares no per-kind limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLimits {
    pub seats: i32,
    pub backpacks: Option<i32>,
    pub small_items: Option<i32>,
    pub large_items: Option<i32>,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Regular => "regular",
            VehicleClass::Van => "van",
            VehicleClass::Minibus => "minibus",
        }
    }

    /// Returns the capacity limits for this vehicle class.
    pub fn limits(&self) -> CapacityLimits {
        match self {
            VehicleClass::Regular => CapacityLimits {
                seats: 4,
                backpacks: Some(4),
                small_items: Some(2),
                large_items: Some(2),
            },
            VehicleClass::Van => CapacityLimits {
                seats: 6,
                backpacks: Some(6),
                small_items: Some(4),
                large_items: Some(4),
            },
            VehicleClass::Minibus => CapacityLimits {
                seats: 12,
                backpacks: None,
                small_items: None,
                large_items: None,
            },
        }
    }

    /// Parses a class name, falling back to `Regular` for unknown values.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl CapacityLimits {
    /// True when the class declares no per-kind luggage limits at all.
    pub fn luggage_unconstrained(&self) -> bool {
        self.backpacks.is_none() && self.small_items.is_none() && self.large_items.is_none()
    }
}

impl FromStr for VehicleClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regular" => Ok(VehicleClass::Regular),
            "van" => Ok(VehicleClass::Van),
            "minibus" => Ok(VehicleClass::Minibus),
            _ => Err(format!("Invalid vehicle class: {}", s)),
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_limits() {
        let limits = VehicleClass::Regular.limits();
        assert_eq!(limits.seats, 4);
        assert_eq!(limits.backpacks, Some(4));
        assert_eq!(limits.small_items, Some(2));
        assert_eq!(limits.large_items, Some(2));
    }

    #[test]
    fn test_van_limits() {
        let limits = VehicleClass::Van.limits();
        assert_eq!(limits.seats, 6);
        assert!(!limits.luggage_unconstrained());
    }

    #[test]
    fn test_minibus_has_no_per_kind_luggage_limits() {
        let limits = VehicleClass::Minibus.limits();
        assert_eq!(limits.seats, 12);
        assert!(limits.luggage_unconstrained());
    }

    #[test]
    fn test_seat_limits_strictly_increase_by_tier() {
        assert!(VehicleClass::Regular.limits().seats < VehicleClass::Van.limits().seats);
        assert!(VehicleClass::Van.limits().seats < VehicleClass::Minibus.limits().seats);
    }

    #[test]
    fn test_parse_known_classes() {
        assert_eq!("regular".parse(), Ok(VehicleClass::Regular));
        assert_eq!("VAN".parse(), Ok(VehicleClass::Van));
        assert_eq!("Minibus".parse(), Ok(VehicleClass::Minibus));
    }

    #[test]
    fn test_unknown_class_falls_back_to_regular() {
        assert_eq!(VehicleClass::parse_or_default("limousine"), VehicleClass::Regular);
        assert_eq!(VehicleClass::parse_or_default(""), VehicleClass::Regular);
    }

    #[test]
    fn test_display_round_trip() {
        for class in [VehicleClass::Regular, VehicleClass::Van, VehicleClass::Minibus] {
            assert_eq!(class.to_string().parse::<VehicleClass>(), Ok(class));
        }
    }

    #[test]
    fn test_serde_rename() {
        assert_eq!(
            serde_json::to_string(&VehicleClass::Minibus).unwrap(),
            "\"minibus\""
        );
    }
}
