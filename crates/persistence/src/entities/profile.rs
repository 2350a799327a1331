//! Profile entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the profiles table.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileEntity {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub payout_account_id: Option<String>,
    pub payouts_enabled: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> domain::models::Profile {
        domain::models::Profile {
            id: self.id,
            display_name: self.display_name,
            email: self.email,
            payout_account_id: self.payout_account_id,
            payouts_enabled: self.payouts_enabled,
            is_admin: self.is_admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<ProfileEntity> for domain::models::Profile {
    fn from(entity: ProfileEntity) -> Self {
        entity.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_to_domain() {
        let entity = ProfileEntity {
            id: Uuid::new_v4(),
            display_name: "Rider".to_string(),
            email: Some("rider@example.com".to_string()),
            payout_account_id: Some("acct_1".to_string()),
            payouts_enabled: true,
            is_admin: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let profile: domain::models::Profile = entity.clone().into();
        assert_eq!(profile.id, entity.id);
        assert!(profile.can_receive_payouts());
    }
}
