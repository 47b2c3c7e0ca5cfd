//! Redis-backed throttle store.
//!
//! Each bucket is a hash with a `count` and the window start in epoch
//! milliseconds (`started`). Window arithmetic uses the caller's clock; the
//! Redis TTL only garbage-collects closed windows.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use jobgate_application::{BucketSnapshot, ThrottleStore};
use jobgate_core::{AppError, AppResult};
use redis::{AsyncCommands, Script};

const RECORD_HIT_SCRIPT: &str = r#"
local key = KEYS[1]
local window_ms = tonumber(ARGV[1])
local now_ms = tonumber(ARGV[2])

local started = tonumber(redis.call('HGET', key, 'started'))
if started == nil or now_ms >= started + window_ms then
  redis.call('DEL', key)
  redis.call('HSET', key, 'started', ARGV[2], 'count', 0)
  started = now_ms
end

local count = redis.call('HINCRBY', key, 'count', 1)
if redis.call('PTTL', key) < 0 then
  redis.call('PEXPIRE', key, math.max(started + window_ms - now_ms, 1))
end

return {count, started}
"#;

const RELEASE_HIT_SCRIPT: &str = r#"
local key = KEYS[1]

if redis.call('HGET', key, 'started') ~= ARGV[1] then
  return 0
end

local count = tonumber(redis.call('HGET', key, 'count') or '0')
if count > 0 then
  redis.call('HINCRBY', key, 'count', -1)
  return 1
end

return 0
"#;

/// Redis implementation of the throttle store port. Shared by every API
/// instance pointing at the same Redis.
#[derive(Clone)]
pub struct RedisThrottleStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisThrottleStore {
    /// Creates a store with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

fn window_millis(window: TimeDelta) -> AppResult<i64> {
    let millis = window.num_milliseconds();
    if millis <= 0 {
        return Err(AppError::Validation(
            "throttle window must be greater than zero".to_owned(),
        ));
    }
    Ok(millis)
}

fn snapshot_from_parts(count: i64, started_ms: i64) -> AppResult<BucketSnapshot> {
    let count = u32::try_from(count)
        .map_err(|error| AppError::Internal(format!("invalid redis throttle count: {error}")))?;
    let window_started_at = Utc
        .timestamp_millis_opt(started_ms)
        .single()
        .ok_or_else(|| {
            AppError::Internal(format!("invalid redis window start timestamp: {started_ms}"))
        })?;

    Ok(BucketSnapshot {
        count,
        window_started_at,
    })
}

/// Interprets an `HMGET count started` reply. Missing fields or a closed
/// window mean there is no active bucket.
fn active_snapshot(
    count: Option<i64>,
    started_ms: Option<i64>,
    window_ms: i64,
    now: DateTime<Utc>,
) -> AppResult<Option<BucketSnapshot>> {
    let (Some(count), Some(started_ms)) = (count, started_ms) else {
        return Ok(None);
    };
    if now.timestamp_millis() >= started_ms.saturating_add(window_ms) {
        return Ok(None);
    }

    snapshot_from_parts(count, started_ms).map(Some)
}

#[async_trait]
impl ThrottleStore for RedisThrottleStore {
    async fn record_hit(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<BucketSnapshot> {
        let window_ms = window_millis(window)?;
        let mut connection = self.connection().await?;

        let (count, started_ms): (i64, i64) = Script::new(RECORD_HIT_SCRIPT)
            .key(self.key_for(key))
            .arg(window_ms)
            .arg(now.timestamp_millis())
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to record redis throttle hit: {error}"))
            })?;

        snapshot_from_parts(count, started_ms)
    }

    async fn peek(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BucketSnapshot>> {
        let window_ms = window_millis(window)?;
        let mut connection = self.connection().await?;

        let (count, started_ms): (Option<i64>, Option<i64>) = connection
            .hmget(self.key_for(key), &["count", "started"])
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to read redis throttle bucket: {error}"))
            })?;

        active_snapshot(count, started_ms, window_ms, now)
    }

    async fn release_hit(&self, key: &str, window_started_at: DateTime<Utc>) -> AppResult<()> {
        let mut connection = self.connection().await?;

        let _released: i64 = Script::new(RELEASE_HIT_SCRIPT)
            .key(self.key_for(key))
            .arg(window_started_at.timestamp_millis().to_string())
            .invoke_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release redis throttle hit: {error}"))
            })?;

        Ok(())
    }

    async fn reset(&self, key: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let removed: i64 = connection.del(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!("failed to reset redis throttle bucket: {error}"))
        })?;

        Ok(removed > 0)
    }

    async fn sweep_expired(&self, _now: DateTime<Utc>) -> AppResult<u64> {
        // Closed windows expire through their TTL.
        Ok(0)
    }
}
