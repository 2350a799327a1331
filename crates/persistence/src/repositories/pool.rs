//! Ride pool repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::RidePoolEntity;
use crate::metrics::QueryTimer;

const POOL_COLUMNS: &str = r#"
    id, ride_id, currency, status, min_contributors,
    reserved_seats, reserved_backpacks, reserved_small_items, reserved_large_items,
    collected_user_share_minor, collected_platform_fee_minor,
    booker_user_id, checkin_code, code_issued_at, code_expires_at,
    created_at, updated_at
"#;

/// Recomputed aggregate values to write back onto a pool row.
#[derive(Debug, Clone)]
pub struct PoolAggregateUpdate {
    pub status: String,
    pub seats: i32,
    pub backpacks: i32,
    pub small_items: i32,
    pub large_items: i32,
    pub user_share_minor: i64,
    pub platform_fee_minor: i64,
}

/// Repository for ride pool database operations.
#[derive(Clone)]
pub struct PoolRepository {
    pool: PgPool,
}

impl PoolRepository {
    /// Creates a new PoolRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get or lazily create the pool for a ride.
    ///
    /// Uses INSERT ... ON CONFLICT DO NOTHING against the UNIQUE(ride_id)
    /// constraint so concurrent first readers converge on one row. The host
    /// starts out as booker. Returns (entity, was_created).
    pub async fn ensure_for_ride(
        &self,
        ride_id: Uuid,
        host_user_id: Uuid,
        currency: &str,
        min_contributors: i32,
    ) -> Result<(RidePoolEntity, bool), sqlx::Error> {
        let timer = QueryTimer::new("ensure_pool_for_ride");

        let insert_result = sqlx::query(
            r#"
            INSERT INTO ride_pools (ride_id, currency, min_contributors, booker_user_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (ride_id) DO NOTHING
            "#,
        )
        .bind(ride_id)
        .bind(currency)
        .bind(min_contributors)
        .bind(host_user_id)
        .execute(&self.pool)
        .await?;

        let was_created = insert_result.rows_affected() > 0;

        let entity = self
            .find_by_ride(ride_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        timer.record();
        Ok((entity, was_created))
    }

    /// Find pool by ride ID.
    pub async fn find_by_ride(&self, ride_id: Uuid) -> Result<Option<RidePoolEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_pool_by_ride");

        let result = sqlx::query_as::<_, RidePoolEntity>(&format!(
            "SELECT {POOL_COLUMNS} FROM ride_pools WHERE ride_id = $1"
        ))
        .bind(ride_id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Find pool by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RidePoolEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_pool_by_id");

        let result = sqlx::query_as::<_, RidePoolEntity>(&format!(
            "SELECT {POOL_COLUMNS} FROM ride_pools WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Set the pool status.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> Result<Option<RidePoolEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_pool_status");

        let result = sqlx::query_as::<_, RidePoolEntity>(&format!(
            r#"
            UPDATE ride_pools SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Write back recomputed aggregates and status in one statement.
    pub async fn update_aggregates(
        &self,
        id: Uuid,
        update: &PoolAggregateUpdate,
    ) -> Result<Option<RidePoolEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_pool_aggregates");

        let result = sqlx::query_as::<_, RidePoolEntity>(&format!(
            r#"
            UPDATE ride_pools SET
                status = $2,
                reserved_seats = $3,
                reserved_backpacks = $4,
                reserved_small_items = $5,
                reserved_large_items = $6,
                collected_user_share_minor = $7,
                collected_platform_fee_minor = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.status)
        .bind(update.seats)
        .bind(update.backpacks)
        .bind(update.small_items)
        .bind(update.large_items)
        .bind(update.user_share_minor)
        .bind(update.platform_fee_minor)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Store a freshly issued check-in code and move the pool to checking_in.
    pub async fn issue_code(
        &self,
        id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<RidePoolEntity>, sqlx::Error> {
        let timer = QueryTimer::new("issue_pool_code");

        let result = sqlx::query_as::<_, RidePoolEntity>(&format!(
            r#"
            UPDATE ride_pools SET
                status = 'checking_in',
                checkin_code = $2,
                code_issued_at = $3,
                code_expires_at = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(code)
        .bind(issued_at)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Reassign the booker role.
    pub async fn set_booker(
        &self,
        id: Uuid,
        booker_user_id: Uuid,
    ) -> Result<Option<RidePoolEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_pool_booker");

        let result = sqlx::query_as::<_, RidePoolEntity>(&format!(
            r#"
            UPDATE ride_pools SET booker_user_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {POOL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(booker_user_id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }
}
