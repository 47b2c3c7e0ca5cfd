use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jobgate_application::{BucketSnapshot, ThrottleStore};
use jobgate_core::AppResult;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct BucketEntry {
    count: u32,
    window_started_at: DateTime<Utc>,
    window_ends_at: DateTime<Utc>,
}

impl BucketEntry {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.window_ends_at
    }

    fn snapshot(&self) -> BucketSnapshot {
        BucketSnapshot {
            count: self.count,
            window_started_at: self.window_started_at,
        }
    }
}

/// Process-local throttle store.
///
/// Counters are lost on restart and are not shared between instances.
#[derive(Default)]
pub struct InMemoryThrottleStore {
    entries: RwLock<HashMap<String, BucketEntry>>,
}

impl InMemoryThrottleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tracked buckets, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns whether no buckets are tracked.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ThrottleStore for InMemoryThrottleStore {
    async fn record_hit(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<BucketSnapshot> {
        let mut entries = self.entries.write().await;
        let fresh = BucketEntry {
            count: 0,
            window_started_at: now,
            window_ends_at: now + window,
        };

        let entry = entries.entry(key.to_owned()).or_insert(fresh);
        if !entry.is_active(now) {
            *entry = fresh;
        }
        entry.count = entry.count.saturating_add(1);

        Ok(entry.snapshot())
    }

    async fn peek(
        &self,
        key: &str,
        window: TimeDelta,
        now: DateTime<Utc>,
    ) -> AppResult<Option<BucketSnapshot>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|entry| now < entry.window_started_at + window)
            .map(BucketEntry::snapshot))
    }

    async fn release_hit(&self, key: &str, window_started_at: DateTime<Utc>) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key)
            && entry.window_started_at == window_started_at
        {
            entry.count = entry.count.saturating_sub(1);
        }

        Ok(())
    }

    async fn reset(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_active(now));

        Ok(u64::try_from(before - entries.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeDelta, Utc};
    use jobgate_application::ThrottleStore;
    use jobgate_core::AppResult;

    use super::InMemoryThrottleStore;

    #[tokio::test]
    async fn hits_accumulate_until_window_closes() -> AppResult<()> {
        let store = InMemoryThrottleStore::new();
        let now = Utc::now();
        let window = TimeDelta::minutes(15);

        store.record_hit("general:ip:1.2.3.4", window, now).await?;
        let second = store
            .record_hit("general:ip:1.2.3.4", window, now + TimeDelta::minutes(5))
            .await?;
        assert_eq!(second.count, 2);
        assert_eq!(second.window_started_at, now);

        let reopened = store
            .record_hit("general:ip:1.2.3.4", window, now + window)
            .await?;
        assert_eq!(reopened.count, 1);
        assert_eq!(reopened.window_started_at, now + window);
        Ok(())
    }

    #[tokio::test]
    async fn peek_hides_expired_windows() -> AppResult<()> {
        let store = InMemoryThrottleStore::new();
        let now = Utc::now();
        let window = TimeDelta::minutes(1);

        assert!(store.peek("message:user:a", window, now).await?.is_none());
        store.record_hit("message:user:a", window, now).await?;
        assert!(store.peek("message:user:a", window, now).await?.is_some());
        assert!(
            store
                .peek("message:user:a", window, now + window)
                .await?
                .is_none()
        );
        Ok(())
    }

    #[tokio::test]
    async fn peek_measures_activity_with_the_given_window() -> AppResult<()> {
        let store = InMemoryThrottleStore::new();
        let now = Utc::now();

        store
            .record_hit("register:ip:10.0.0.9", TimeDelta::hours(1), now)
            .await?;
        let later = now + TimeDelta::minutes(2);

        assert!(
            store
                .peek("register:ip:10.0.0.9", TimeDelta::hours(1), later)
                .await?
                .is_some()
        );
        assert!(
            store
                .peek("register:ip:10.0.0.9", TimeDelta::minutes(1), later)
                .await?
                .is_none()
        );
        Ok(())
    }

    #[tokio::test]
    async fn release_never_goes_below_zero_and_ignores_old_windows() -> AppResult<()> {
        let store = InMemoryThrottleStore::new();
        let now = Utc::now();
        let window = TimeDelta::minutes(15);

        let first = store.record_hit("auth:ip:::1", window, now).await?;
        store.release_hit("auth:ip:::1", first.window_started_at).await?;
        store.release_hit("auth:ip:::1", first.window_started_at).await?;
        assert_eq!(
            store.peek("auth:ip:::1", window, now).await?.map(|s| s.count),
            Some(0)
        );

        let later = now + window;
        store.record_hit("auth:ip:::1", window, later).await?;
        store.release_hit("auth:ip:::1", first.window_started_at).await?;
        assert_eq!(
            store.peek("auth:ip:::1", window, later).await?.map(|s| s.count),
            Some(1)
        );
        Ok(())
    }

    #[tokio::test]
    async fn sweep_and_reset_remove_entries() -> AppResult<()> {
        let store = InMemoryThrottleStore::new();
        let now = Utc::now();

        store
            .record_hit("message:ip:10.0.0.1", TimeDelta::minutes(1), now)
            .await?;
        store
            .record_hit("register:ip:10.0.0.1", TimeDelta::hours(1), now)
            .await?;

        assert_eq!(store.sweep_expired(now + TimeDelta::minutes(1)).await?, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.reset("register:ip:10.0.0.1").await?);
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_hits_are_all_counted() -> AppResult<()> {
        let store = Arc::new(InMemoryThrottleStore::new());
        let now = Utc::now();
        let window = TimeDelta::minutes(15);

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record_hit("upload:user:u-1", window, now).await
            }));
        }
        for handle in handles {
            if let Err(error) = handle.await {
                panic!("task failed: {error}");
            }
        }

        let snapshot = store.peek("upload:user:u-1", window, now).await?;
        assert_eq!(snapshot.map(|s| s.count), Some(64));
        Ok(())
    }
}
