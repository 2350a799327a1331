//! Profile repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ProfileEntity;
use crate::metrics::QueryTimer;

const PROFILE_COLUMNS: &str = r#"
    id, display_name, email, payout_account_id, payouts_enabled, is_admin,
    created_at, updated_at
"#;

/// Input data for creating or refreshing a profile.
#[derive(Debug, Clone)]
pub struct ProfileInput {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
}

/// Repository for profile database operations.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Creates a new ProfileRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find profile by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ProfileEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_profile_by_id");

        let result = sqlx::query_as::<_, ProfileEntity>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Create or refresh a profile keyed by the token subject.
    pub async fn upsert(&self, input: ProfileInput) -> Result<ProfileEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_profile");

        let result = sqlx::query_as::<_, ProfileEntity>(&format!(
            r#"
            INSERT INTO profiles (id, display_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                email = COALESCE(EXCLUDED.email, profiles.email),
                updated_at = NOW()
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(input.id)
        .bind(&input.display_name)
        .bind(input.email)
        .fetch_one(&self.pool)
        .await;

        timer.record();
        result
    }

    /// Record the payment provider account used to receive payouts.
    pub async fn set_payout_account(
        &self,
        id: Uuid,
        payout_account_id: &str,
        payouts_enabled: bool,
    ) -> Result<Option<ProfileEntity>, sqlx::Error> {
        let timer = QueryTimer::new("set_profile_payout_account");

        let result = sqlx::query_as::<_, ProfileEntity>(&format!(
            r#"
            UPDATE profiles
            SET payout_account_id = $2, payouts_enabled = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(payout_account_id)
        .bind(payouts_enabled)
        .fetch_optional(&self.pool)
        .await;

        timer.record();
        result
    }
}
