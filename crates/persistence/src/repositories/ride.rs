//! Ride repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::RideEntity;
use crate::metrics::QueryTimer;

const RIDE_COLUMNS: &str = r#"
    id, host_user_id, origin_name, origin_lat, origin_lng,
    destination_name, destination_lat, destination_lng, departs_at,
    host_seats, host_backpacks, host_small_items, host_large_items,
    total_items_limit, vehicle_class, estimated_fare, status,
    created_at, updated_at
"#;

/// Input data for inserting a ride.
#[derive(Debug, Clone)]
pub struct RideInput {
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
}

/// Input data for updating a ride. `None` fields keep the current value.
#[derive(Debug, Clone, Default)]
pub struct RideUpdateInput {
    pub departs_at: Option<DateTime<Utc>>,
    pub host_seats: Option<i32>,
    pub host_backpacks: Option<i32>,
    pub host_small_items: Option<i32>,
    pub host_large_items: Option<i32>,
    pub vehicle_class: Option<String>,
    pub estimated_fare: Option<f64>,
}

/// Repository for ride database operations.
#[derive(Clone)]
pub struct RideRepository {
    pool: PgPool,
}

impl RideRepository {
    /// Creates a new RideRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new ride.
    pub async fn create(&self, input: RideInput) -> Result<RideEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_ride");

        let result = sqlx::query_as::<_, RideEntity>(&format!(
            r#"
            INSERT INTO rides (
                host_user_id, origin_name, origin_lat, origin_lng,
                destination_name, destination_lat, destination_lng, departs_at,
                host_seats, host_backpacks, host_small_items, host_large_items,
                total_items_limit, vehicle_class, estimated_fare
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {RIDE_COLUMNS}
            "#
        ))
        .bind(input.host_user_id)
        .bind(&input.origin_name)
        .bind(input.origin_lat)
        .bind(input.origin_lng)
        .bind(&input.destination_name)
        .bind(input.destination_lat)
        .bind(input.destination_lng)
        .bind(input.departs_at)
        .bind(input.host_seats)
        .bind(input.host_backpacks)
        .bind(input.host_small_items)
        .bind(input.host_large_items)
        .bind(input.total_items_limit)
        .bind(&input.vehicle_class)
        .bind(input.estimated_fare)
        .fetch_one(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Find ride by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_ride_by_id");

        let result = sqlx::query_as::<_, RideEntity>(&format!(
            "SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// List active upcoming rides, soonest departure first.
    pub async fn list_active(
        &self,
        after: DateTime<Utc>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_rides");

        let result = sqlx::query_as::<_, RideEntity>(&format!(
            r#"
            SELECT {RIDE_COLUMNS} FROM rides
            WHERE status = 'active' AND departs_at > $1
            ORDER BY departs_at ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(after)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Count active upcoming rides.
    pub async fn count_active(&self, after: DateTime<Utc>) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_active_rides");

        let result = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM rides WHERE status = 'active' AND departs_at > $1",
        )
        .bind(after)
        .fetch_one(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Apply a partial update to a ride.
    pub async fn update(
        &self,
        id: Uuid,
        input: RideUpdateInput,
    ) -> Result<Option<RideEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_ride");

        let result = sqlx::query_as::<_, RideEntity>(&format!(
            r#"
            UPDATE rides SET
                departs_at = COALESCE($2, departs_at),
                host_seats = COALESCE($3, host_seats),
                host_backpacks = COALESCE($4, host_backpacks),
                host_small_items = COALESCE($5, host_small_items),
                host_large_items = COALESCE($6, host_large_items),
                vehicle_class = COALESCE($7, vehicle_class),
                estimated_fare = COALESCE($8, estimated_fare),
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {RIDE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(input.departs_at)
        .bind(input.host_seats)
        .bind(input.host_backpacks)
        .bind(input.host_small_items)
        .bind(input.host_large_items)
        .bind(input.vehicle_class)
        .bind(input.estimated_fare)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Soft-delete a ride. Returns true when the ride was still active.
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("soft_delete_ride");

        let result = sqlx::query(
            "UPDATE rides SET status = 'deleted', updated_at = NOW() WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await;

        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }
}
