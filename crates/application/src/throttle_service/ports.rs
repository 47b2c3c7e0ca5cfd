use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use jobgate_core::AppResult;

/// Storage port for throttle buckets.
///
/// Keys are opaque `"{category}:{identity}"` strings. Every operation takes
/// the caller's `now` so window arithmetic follows a single clock. A window
/// is active while `now < window_started_at + window`.
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// Atomically counts one hit for `key`.
    ///
    /// Opens a fresh window starting at `now` with a count of one when no
    /// window is active. Returns the bucket after the increment.
    async fn record_hit(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<BucketSnapshot>;

    /// Returns the active window for `key` without counting anything.
    ///
    /// Activity is measured with `window`, not the length the bucket was
    /// recorded with, so a shortened policy takes effect immediately.
    async fn peek(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BucketSnapshot>>;

    /// Removes one hit from the window that started at `window_started_at`.
    ///
    /// Does nothing when that window is no longer the stored one. The count
    /// never drops below zero.
    async fn release_hit(&self, key: &str, window_started_at: DateTime<Utc>) -> AppResult<()>;

    /// Deletes the bucket for `key`. Returns whether one existed.
    async fn reset(&self, key: &str) -> AppResult<bool>;

    /// Removes buckets whose window closed at or before `now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Counter state of one bucket's active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    /// Counted requests in the window (including the one just recorded).
    pub count: u32,
    /// When the window started.
    pub window_started_at: DateTime<Utc>,
}
