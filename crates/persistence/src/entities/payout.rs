//! Booker payout entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the booker_payouts table.
#[derive(Debug, Clone, FromRow)]
pub struct BookerPayoutEntity {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub booker_user_id: Uuid,
    pub currency: String,
    pub amount_minor: i64,
    pub status: String,
    pub transfer_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookerPayoutEntity {
    /// Convert to domain model.
    pub fn into_domain(self) -> domain::models::BookerPayout {
        use domain::models::PayoutStatus;

        let status = self
            .status
            .parse::<PayoutStatus>()
            .unwrap_or(PayoutStatus::Pending);

        domain::models::BookerPayout {
            id: self.id,
            pool_id: self.pool_id,
            booker_user_id: self.booker_user_id,
            currency: self.currency,
            amount_minor: self.amount_minor,
            status,
            transfer_ref: self.transfer_ref,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<BookerPayoutEntity> for domain::models::BookerPayout {
    fn from(entity: BookerPayoutEntity) -> Self {
        entity.into_domain()
    }
}
