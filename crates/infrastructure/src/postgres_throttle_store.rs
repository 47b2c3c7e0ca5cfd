//! PostgreSQL-backed throttle store using the `throttle_buckets` table.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;

use jobgate_application::{BucketSnapshot, ThrottleStore};
use jobgate_core::{AppError, AppResult};

#[cfg(test)]
mod tests;

/// PostgreSQL implementation of the throttle store port.
#[derive(Clone)]
pub struct PostgresThrottleStore {
    pool: PgPool,
}

impl PostgresThrottleStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThrottleStore for PostgresThrottleStore {
    async fn record_hit(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<BucketSnapshot> {
        if window <= TimeDelta::zero() {
            return Err(AppError::Validation(
                "throttle window must be greater than zero".to_owned(),
            ));
        }

        // A closed window is replaced by a fresh one starting at $2.
        let row = sqlx::query_as::<_, BucketRow>(
            r#"
            INSERT INTO throttle_buckets (key, window_started_at, window_ends_at, attempt_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (key) DO UPDATE
            SET
                attempt_count = CASE
                    WHEN throttle_buckets.window_ends_at <= $2 THEN 1
                    ELSE throttle_buckets.attempt_count + 1
                END,
                window_started_at = CASE
                    WHEN throttle_buckets.window_ends_at <= $2 THEN $2
                    ELSE throttle_buckets.window_started_at
                END,
                window_ends_at = CASE
                    WHEN throttle_buckets.window_ends_at <= $2 THEN $3
                    ELSE throttle_buckets.window_ends_at
                END
            RETURNING attempt_count, window_started_at
            "#,
        )
        .bind(key)
        .bind(now)
        .bind(now + window)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to record throttle hit: {error}")))?;

        row.into_snapshot()
    }

    async fn peek(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BucketSnapshot>> {
        // Active while now < window_started_at + window.
        let row = sqlx::query_as::<_, BucketRow>(
            r#"
            SELECT attempt_count, window_started_at
            FROM throttle_buckets
            WHERE key = $1 AND window_started_at > $2
            "#,
        )
        .bind(key)
        .bind(now - window)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read throttle bucket: {error}")))?;

        row.map(BucketRow::into_snapshot).transpose()
    }

    async fn release_hit(&self, key: &str, window_started_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE throttle_buckets
            SET attempt_count = attempt_count - 1
            WHERE key = $1 AND window_started_at = $2 AND attempt_count > 0
            "#,
        )
        .bind(key)
        .bind(window_started_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to release throttle hit: {error}")))?;

        Ok(())
    }

    async fn reset(&self, key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM throttle_buckets WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to reset throttle bucket: {error}"))
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM throttle_buckets WHERE window_ends_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to sweep expired throttle buckets: {error}"))
            })?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BucketRow {
    attempt_count: i32,
    window_started_at: DateTime<Utc>,
}

impl BucketRow {
    fn into_snapshot(self) -> AppResult<BucketSnapshot> {
        let count = u32::try_from(self.attempt_count).map_err(|error| {
            AppError::Internal(format!("invalid stored throttle count: {error}"))
        })?;

        Ok(BucketSnapshot {
            count,
            window_started_at: self.window_started_at,
        })
    }
}
