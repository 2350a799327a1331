//! Contribution entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the ride_pool_contributions table.
#[derive(Debug, Clone, FromRow)]
pub struct ContributionEntity {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    pub user_share_minor: i64,
    pub platform_fee_minor: i64,
    pub seats: i32,
    pub backpacks: i32,
    pub small_items: i32,
    pub large_items: i32,
    pub status: String,
    pub is_host: bool,
    pub payment_ref: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContributionEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> domain::models::Contribution {
        use domain::models::ContributionStatus;

        let status = self
            .status
            .parse::<ContributionStatus>()
            .unwrap_or(ContributionStatus::Pending);

        domain::models::Contribution {
            id: self.id,
            pool_id: self.pool_id,
            user_id: self.user_id,
            currency: self.currency,
            user_share_minor: self.user_share_minor,
            platform_fee_minor: self.platform_fee_minor,
            seats: self.seats,
            backpacks: self.backpacks,
            small_items: self.small_items,
            large_items: self.large_items,
            status,
            is_host: self.is_host,
            payment_ref: self.payment_ref,
            checked_in_at: self.checked_in_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<ContributionEntity> for domain::models::Contribution {
    fn from(entity: ContributionEntity) -> Self {
        entity.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::ContributionStatus;

    fn create_test_entity() -> ContributionEntity {
        ContributionEntity {
            id: Uuid::new_v4(),
            pool_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            currency: "gbp".to_string(),
            user_share_minor: 1500,
            platform_fee_minor: 75,
            seats: 2,
            backpacks: 1,
            small_items: 0,
            large_items: 1,
            status: "paid".to_string(),
            is_host: false,
            payment_ref: Some("cs_test_123".to_string()),
            checked_in_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let entity = create_test_entity();
        let contribution: domain::models::Contribution = entity.clone().into();

        assert_eq!(contribution.id, entity.id);
        assert_eq!(contribution.status, ContributionStatus::Paid);
        assert_eq!(contribution.seats, 2);
        assert_eq!(contribution.payment_ref.as_deref(), Some("cs_test_123"));
        assert!(!contribution.is_checked_in());
    }

    #[test]
    fn test_unknown_status_defaults_to_pending() {
        let mut entity = create_test_entity();
        entity.status = "settled".to_string();

        let contribution: domain::models::Contribution = entity.into();
        assert_eq!(contribution.status, ContributionStatus::Pending);
    }

    #[test]
    fn test_checked_in_timestamp() {
        let mut entity = create_test_entity();
        entity.checked_in_at = Some(Utc::now());

        let contribution: domain::models::Contribution = entity.into();
        assert!(contribution.is_checked_in());
    }
}
