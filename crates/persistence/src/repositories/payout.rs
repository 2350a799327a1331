//! Booker payout repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::BookerPayoutEntity;
use crate::metrics::QueryTimer;

const PAYOUT_COLUMNS: &str = r#"
    id, pool_id, booker_user_id, currency, amount_minor, status, transfer_ref,
    created_at, updated_at
"#;

/// Repository for booker payout database operations.
#[derive(Clone)]
pub struct PayoutRepository {
    pool: PgPool,
}

impl PayoutRepository {
    /// Creates a new PayoutRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the pending payout for a pool.
    ///
    /// The UNIQUE(pool_id) constraint makes confirm-booked idempotent:
    /// a second call returns None and the caller keeps the existing payout.
    pub async fn create_pending(
        &self,
        pool_id: Uuid,
        booker_user_id: Uuid,
        currency: &str,
        amount_minor: i64,
    ) -> Result<Option<BookerPayoutEntity>, sqlx::Error> {
        let timer = QueryTimer::new("create_pending_payout");

        let result = sqlx::query_as::<_, BookerPayoutEntity>(&format!(
            r#"
            INSERT INTO booker_payouts (pool_id, booker_user_id, currency, amount_minor)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (pool_id) DO NOTHING
            RETURNING {PAYOUT_COLUMNS}
            "#
        ))
        .bind(pool_id)
        .bind(booker_user_id)
        .bind(currency)
        .bind(amount_minor)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Find the payout for a pool.
    pub async fn find_by_pool(
        &self,
        pool_id: Uuid,
    ) -> Result<Option<BookerPayoutEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_payout_by_pool");

        let result = sqlx::query_as::<_, BookerPayoutEntity>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM booker_payouts WHERE pool_id = $1"
        ))
        .bind(pool_id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Record the provider transfer for a payout and mark it sent.
    pub async fn mark_sent(
        &self,
        id: Uuid,
        transfer_ref: &str,
    ) -> Result<Option<BookerPayoutEntity>, sqlx::Error> {
        let timer = QueryTimer::new("mark_payout_sent");

        let result = sqlx::query_as::<_, BookerPayoutEntity>(&format!(
            r#"
            UPDATE booker_payouts
            SET status = 'sent', transfer_ref = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYOUT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(transfer_ref)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Mark a payout as failed so it can be retried out of band.
    pub async fn mark_failed(&self, id: Uuid) -> Result<Option<BookerPayoutEntity>, sqlx::Error> {
        let timer = QueryTimer::new("mark_payout_failed");

        let result = sqlx::query_as::<_, BookerPayoutEntity>(&format!(
            r#"
            UPDATE booker_payouts
            SET status = 'failed', updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYOUT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }
}
