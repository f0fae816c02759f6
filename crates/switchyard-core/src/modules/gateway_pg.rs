//! PostgreSQL implementation of the gateway store.

use crate::modules::gateway_pg_helpers::{
    row_to_model, row_to_provider, row_to_tier, row_to_user_quota,
};
use crate::modules::repository::{GatewayStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use switchyard_types::models::{ModelConfig, NewUserQuota, ProviderConfig, QuotaTier, UserQuota};

const USER_QUOTA_COLUMNS: &str = "uid, tier, rpm, tpd, used_tokens_today, last_reset_at";

/// PostgreSQL-backed gateway store.
pub struct PostgresGatewayStore {
    pool: PgPool,
}

impl PostgresGatewayStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connect to database and create store.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create tables and seed the default quota tiers.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Database(err.to_string()))
    }
}

#[async_trait]
impl GatewayStore for PostgresGatewayStore {
    async fn list_active_providers(&self) -> StoreResult<Vec<ProviderConfig>> {
        let rows = sqlx::query(
            "SELECT name, display_name, status, is_default, sort FROM ai_provider
             WHERE status = 'active' ORDER BY sort ASC, name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_provider).collect()
    }

    async fn list_active_models(&self) -> StoreResult<Vec<ModelConfig>> {
        let rows = sqlx::query(
            "SELECT model, provider_name, display_name, max_tokens, input_price, output_price,
                    status, is_default, sort, allow_fallback
             FROM ai_model WHERE status = 'active' ORDER BY sort ASC, model ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_model).collect()
    }

    async fn get_user_quota(&self, uid: &str) -> StoreResult<Option<UserQuota>> {
        let sql = format!("SELECT {USER_QUOTA_COLUMNS} FROM ai_user_quota WHERE uid = $1");
        let row = sqlx::query(&sql).bind(uid).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_user_quota).transpose()
    }

    async fn create_user_quota(&self, uid: &str, quota: NewUserQuota) -> StoreResult<UserQuota> {
        let rpm = i32::try_from(quota.rpm).unwrap_or(i32::MAX);
        sqlx::query(
            "INSERT INTO ai_user_quota (uid, tier, rpm, tpd) VALUES ($1, $2, $3, $4)
             ON CONFLICT (uid) DO NOTHING",
        )
        .bind(uid)
        .bind(&quota.tier)
        .bind(rpm)
        .bind(quota.tpd)
        .execute(&self.pool)
        .await?;

        self.get_user_quota(uid).await?.ok_or_else(|| StoreError::NotFound(uid.to_string()))
    }

    async fn increment_used_tokens(&self, uid: &str, delta: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE ai_user_quota SET used_tokens_today = used_tokens_today + $2,
                    updated_at = NOW()
             WHERE uid = $1",
        )
        .bind(uid)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(uid.to_string()));
        }
        Ok(())
    }

    async fn reset_daily_tokens(&self, uid: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE ai_user_quota SET used_tokens_today = 0, last_reset_at = $2,
                    updated_at = NOW()
             WHERE uid = $1",
        )
        .bind(uid)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(uid.to_string()));
        }
        Ok(())
    }

    async fn get_quota_tier(&self, tier: &str) -> StoreResult<Option<QuotaTier>> {
        let row =
            sqlx::query("SELECT tier, display_name, rpm, tpd FROM ai_quota_tier WHERE tier = $1")
                .bind(tier)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(row_to_tier).transpose()
    }
}
