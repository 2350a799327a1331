//! Contribution repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ContributionEntity;
use crate::metrics::QueryTimer;

const CONTRIBUTION_COLUMNS: &str = r#"
    id, pool_id, user_id, currency, user_share_minor, platform_fee_minor,
    seats, backpacks, small_items, large_items, status, is_host,
    payment_ref, checked_in_at, created_at, updated_at
"#;

/// Input data for taking or refreshing a seat lock. Amounts are not part of
/// the lock; checkout prices the row later.
#[derive(Debug, Clone)]
pub struct SeatLockInput {
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub currency: String,
    pub seats: i32,
    pub backpacks: i32,
    pub small_items: i32,
    pub large_items: i32,
}

/// Repository for contribution database operations.
#[derive(Clone)]
pub struct ContributionRepository {
    pool: PgPool,
}

impl ContributionRepository {
    /// Creates a new ContributionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seed the host's baseline contribution for a freshly created pool.
    ///
    /// The row carries the host's declared seats and luggage with zero
    /// amounts; it never counts toward paid capacity or quorum. Idempotent
    /// via the (pool, user) unique constraint.
    pub async fn ensure_host_baseline(
        &self,
        pool_id: Uuid,
        host_user_id: Uuid,
        currency: &str,
        seats: i32,
        backpacks: i32,
        small_items: i32,
        large_items: i32,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("ensure_host_baseline");

        sqlx::query(
            r#"
            INSERT INTO ride_pool_contributions (
                pool_id, user_id, currency, seats, backpacks, small_items,
                large_items, is_host
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (pool_id, user_id) DO NOTHING
            "#,
        )
        .bind(pool_id)
        .bind(host_user_id)
        .bind(currency)
        .bind(seats)
        .bind(backpacks)
        .bind(small_items)
        .bind(large_items)
        .execute(&self.pool)
        .await?;

        timer.record();
        Ok(())
    }

    /// Take or refresh a seat lock for (pool, user).
    ///
    /// Inserts a zero-amount pending row, or overwrites an existing row that
    /// is still pending or canceled. Returns None when the user already holds
    /// an authorized, paid or refunded contribution; callers surface that as
    /// a state violation.
    pub async fn upsert_seat_lock(
        &self,
        input: SeatLockInput,
    ) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("upsert_seat_lock");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            INSERT INTO ride_pool_contributions (
                pool_id, user_id, currency, seats, backpacks, small_items,
                large_items
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (pool_id, user_id) DO UPDATE SET
                currency = EXCLUDED.currency,
                user_share_minor = 0,
                platform_fee_minor = 0,
                seats = EXCLUDED.seats,
                backpacks = EXCLUDED.backpacks,
                small_items = EXCLUDED.small_items,
                large_items = EXCLUDED.large_items,
                status = 'pending',
                payment_ref = NULL,
                created_at = NOW(),
                updated_at = NOW()
            WHERE ride_pool_contributions.status IN ('pending', 'canceled')
            RETURNING {CONTRIBUTION_COLUMNS}
            "#
        ))
        .bind(input.pool_id)
        .bind(input.user_id)
        .bind(&input.currency)
        .bind(input.seats)
        .bind(input.backpacks)
        .bind(input.small_items)
        .bind(input.large_items)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Write the checkout-time price onto a pending seat lock.
    pub async fn price_seat_lock(
        &self,
        id: Uuid,
        user_share_minor: i64,
        platform_fee_minor: i64,
    ) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("price_seat_lock");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            UPDATE ride_pool_contributions
            SET user_share_minor = $2, platform_fee_minor = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {CONTRIBUTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_share_minor)
        .bind(platform_fee_minor)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// All contributions in a pool, oldest first.
    pub async fn find_by_pool(
        &self,
        pool_id: Uuid,
    ) -> Result<Vec<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_contributions_by_pool");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            SELECT {CONTRIBUTION_COLUMNS} FROM ride_pool_contributions
            WHERE pool_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(pool_id)
        .fetch_all(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Find contribution by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_contribution_by_id");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM ride_pool_contributions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// A user's contribution in a pool, if any.
    pub async fn find_by_pool_and_user(
        &self,
        pool_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_contribution_by_pool_and_user");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            SELECT {CONTRIBUTION_COLUMNS} FROM ride_pool_contributions
            WHERE pool_id = $1 AND user_id = $2
            "#
        ))
        .bind(pool_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Find the contribution referenced by a checkout session or charge.
    pub async fn find_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_contribution_by_payment_ref");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            SELECT {CONTRIBUTION_COLUMNS} FROM ride_pool_contributions
            WHERE payment_ref = $1
            "#
        ))
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Attach a payment provider reference to a pending contribution.
    pub async fn set_payment_ref(
        &self,
        id: Uuid,
        payment_ref: &str,
    ) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_contribution_payment_ref");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            UPDATE ride_pool_contributions
            SET payment_ref = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRIBUTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Move a contribution to a new status.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_contribution_status");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            UPDATE ride_pool_contributions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRIBUTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Record a check-in. Idempotent: an already checked-in row keeps its
    /// original timestamp.
    pub async fn mark_checked_in(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<ContributionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("mark_contribution_checked_in");

        let result = sqlx::query_as::<_, ContributionEntity>(&format!(
            r#"
            UPDATE ride_pool_contributions
            SET checked_in_at = COALESCE(checked_in_at, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING {CONTRIBUTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Count paid contributors who have checked in.
    pub async fn count_checked_in_paid(&self, pool_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_checked_in_paid");

        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM ride_pool_contributions
            WHERE pool_id = $1 AND status = 'paid' AND checked_in_at IS NOT NULL
            "#,
        )
        .bind(pool_id)
        .fetch_one(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Cancel pending seat locks created before the cutoff. Host baseline
    /// rows are not seat locks and are left alone.
    ///
    /// Returns the affected pool IDs so the caller can re-aggregate them.
    pub async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("expire_pending_contributions");

        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE ride_pool_contributions
            SET status = 'canceled', updated_at = NOW()
            WHERE status = 'pending' AND is_host = FALSE AND created_at < $1
            RETURNING pool_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await;

        timer.record();
        result
    }
}
