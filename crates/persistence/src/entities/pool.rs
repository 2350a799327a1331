//! Ride pool entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the ride_pools table.
#[derive(Debug, Clone, FromRow)]
pub struct RidePoolEntity {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub currency: String,
    pub status: String,
    pub min_contributors: i32,
    pub reserved_seats: i32,
    pub reserved_backpacks: i32,
    pub reserved_small_items: i32,
    pub reserved_large_items: i32,
    pub collected_user_share_minor: i64,
    pub collected_platform_fee_minor: i64,
    pub booker_user_id: Uuid,
    pub checkin_code: Option<String>,
    pub code_issued_at: Option<DateTime<Utc>>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RidePoolEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> domain::models::RidePool {
        use domain::models::PoolStatus;

        let status = self
            .status
            .parse::<PoolStatus>()
            .unwrap_or(PoolStatus::Collecting);

        domain::models::RidePool {
            id: self.id,
            ride_id: self.ride_id,
            currency: self.currency,
            status,
            min_contributors: self.min_contributors,
            reserved_seats: self.reserved_seats,
            reserved_backpacks: self.reserved_backpacks,
            reserved_small_items: self.reserved_small_items,
            reserved_large_items: self.reserved_large_items,
            collected_user_share_minor: self.collected_user_share_minor,
            collected_platform_fee_minor: self.collected_platform_fee_minor,
            booker_user_id: self.booker_user_id,
            checkin_code: self.checkin_code,
            code_issued_at: self.code_issued_at,
            code_expires_at: self.code_expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<RidePoolEntity> for domain::models::RidePool {
    fn from(entity: RidePoolEntity) -> Self {
        entity.into_domain()
    }
}
