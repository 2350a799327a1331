//! Seat lock expiry background job.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use domain::models::SEAT_LOCK_TTL_SECS;
use persistence::repositories::{ContributionRepository, PoolRepository};

use super::scheduler::{Job, JobFrequency};
use crate::middleware::metrics as business_metrics;
use crate::services::aggregator;

/// Cancels pending contributions whose seat lock lapsed and re-aggregates the
/// affected pools so the reserved capacity is released.
pub struct ExpireSeatLocksJob {
    pool: PgPool,
    sweep_secs: u64,
}

impl ExpireSeatLocksJob {
    pub fn new(pool: PgPool, sweep_secs: u64) -> Self {
        Self { pool, sweep_secs }
    }

    async fn expire(&self) -> Result<usize, String> {
        let contributions = ContributionRepository::new(self.pool.clone());
        let pools = PoolRepository::new(self.pool.clone());

        let cutoff = Utc::now() - Duration::seconds(SEAT_LOCK_TTL_SECS);
        let affected = contributions
            .expire_pending_before(cutoff)
            .await
            .map_err(|e| format!("Failed to expire seat locks: {}", e))?;

        let expired = affected.len();
        if expired == 0 {
            return Ok(0);
        }

        // Several locks may lapse in one pool; aggregate each pool once.
        let pool_ids: HashSet<Uuid> = affected.into_iter().collect();
        for pool_id in pool_ids {
            aggregator::recalc_pool(&pools, &contributions, pool_id)
                .await
                .map_err(|e| format!("Failed to re-aggregate pool {}: {}", pool_id, e))?;
        }

        Ok(expired)
    }
}

#[async_trait::async_trait]
impl Job for ExpireSeatLocksJob {
    fn name(&self) -> &'static str {
        "expire_seat_locks"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.sweep_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let expired = self.expire().await?;

        if expired > 0 {
            business_metrics::record_seat_locks_expired(expired);
            info!(expired, "Released lapsed seat locks");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_matches_lock_ttl() {
        let now = Utc::now();
        let cutoff = now - Duration::seconds(SEAT_LOCK_TTL_SECS);
        assert_eq!((now - cutoff).num_seconds(), 300);
    }

    #[test]
    fn test_sweep_frequency() {
        let freq = JobFrequency::Seconds(60);
        assert_eq!(freq.duration(), std::time::Duration::from_secs(60));
    }
}
