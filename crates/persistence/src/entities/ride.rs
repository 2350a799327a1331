//! Ride entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the rides table.
///
/// Status and vehicle class are stored as text and parsed leniently when
/// converting to the domain model.
#[derive(Debug, Clone, FromRow)]
pub struct RideEntity {
    pub id: Uuid,
    pub host_user_id: Uuid,
    pub origin_name: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_name: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub departs_at: DateTime<Utc>,
    pub host_seats: i32,
    pub host_backpacks: i32,
    pub host_small_items: i32,
    pub host_large_items: i32,
    pub total_items_limit: Option<i32>,
    pub vehicle_class: String,
    pub estimated_fare: Option<f64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RideEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> domain::models::Ride {
        use domain::models::ride::RideStatus;
        use domain::models::VehicleClass;

        let vehicle_class = VehicleClass::parse_or_default(&self.vehicle_class);
        let status = self.status.parse::<RideStatus>().unwrap_or(RideStatus::Active);

        domain::models::Ride {
            id: self.id,
            host_user_id: self.host_user_id,
            origin_name: self.origin_name,
            origin_lat: self.origin_lat,
            origin_lng: self.origin_lng,
            destination_name: self.destination_name,
            destination_lat: self.destination_lat,
            destination_lng: self.destination_lng,
            departs_at: self.departs_at,
            host_seats: self.host_seats,
            host_backpacks: self.host_backpacks,
            host_small_items: self.host_small_items,
            host_large_items: self.host_large_items,
            total_items_limit: self.total_items_limit,
            vehicle_class,
            estimated_fare: self.estimated_fare,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<RideEntity> for domain::models::Ride {
    fn from(entity: RideEntity) -> Self {
        entity.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::ride::RideStatus;
    use domain::models::VehicleClass;

    fn create_test_entity() -> RideEntity {
        RideEntity {
            id: Uuid::new_v4(),
            host_user_id: Uuid::new_v4(),
            origin_name: "Airport".to_string(),
            origin_lat: 51.47,
            origin_lng: -0.45,
            destination_name: "City Centre".to_string(),
            destination_lat: 51.51,
            destination_lng: -0.12,
            departs_at: Utc::now(),
            host_seats: 1,
            host_backpacks: 1,
            host_small_items: 0,
            host_large_items: 0,
            total_items_limit: None,
            vehicle_class: "van".to_string(),
            estimated_fare: Some(42.5),
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let entity = create_test_entity();
        let ride: domain::models::Ride = entity.clone().into();

        assert_eq!(ride.id, entity.id);
        assert_eq!(ride.host_user_id, entity.host_user_id);
        assert_eq!(ride.vehicle_class, VehicleClass::Van);
        assert_eq!(ride.status, RideStatus::Active);
        assert_eq!(ride.estimated_fare, Some(42.5));
    }

    #[test]
    fn test_unknown_vehicle_class_defaults_to_regular() {
        let mut entity = create_test_entity();
        entity.vehicle_class = "hovercraft".to_string();

        let ride: domain::models::Ride = entity.into();
        assert_eq!(ride.vehicle_class, VehicleClass::Regular);
    }

    #[test]
    fn test_deleted_status() {
        let mut entity = create_test_entity();
        entity.status = "deleted".to_string();

        let ride: domain::models::Ride = entity.into();
        assert_eq!(ride.status, RideStatus::Deleted);
        assert!(!ride.is_active());
    }
}
