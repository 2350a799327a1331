//! Pool aggregate recomputation.
//!
//! Reloads a pool's contributions, recomputes the cached totals and the
//! early-stage status, and writes both back. Called after every event that
//! changes a contribution: webhook captures, seat lock expiry, cancellation.

use tracing::info;
use uuid::Uuid;

use domain::models::{Contribution, RidePool};
use domain::services::booking;
use persistence::repositories::{ContributionRepository, PoolAggregateUpdate, PoolRepository};

use crate::error::ApiError;

/// Recompute and persist a pool's aggregates. Returns the updated pool.
pub async fn recalc_pool(
    pools: &PoolRepository,
    contributions: &ContributionRepository,
    pool_id: Uuid,
) -> Result<RidePool, ApiError> {
    let pool: RidePool = pools
        .find_by_id(pool_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Pool not found".into()))?
        .into();

    let rows: Vec<Contribution> = contributions
        .find_by_pool(pool_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let decision = booking::aggregate(&pool, &rows);

    let update = PoolAggregateUpdate {
        status: decision.status.to_string(),
        seats: decision.totals.seats,
        backpacks: decision.totals.backpacks,
        small_items: decision.totals.small_items,
        large_items: decision.totals.large_items,
        user_share_minor: decision.totals.user_share_minor,
        platform_fee_minor: decision.totals.platform_fee_minor,
    };

    let updated: RidePool = pools
        .update_aggregates(pool_id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Pool not found".into()))?
        .into();

    if updated.status != pool.status {
        info!(
            pool_id = %pool_id,
            from = %pool.status,
            to = %updated.status,
            "Pool status changed during aggregation"
        );
    }

    Ok(updated)
}
