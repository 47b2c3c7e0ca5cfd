use std::sync::Arc;

use chrono::{DateTime, Utc};

use jobgate_core::AppResult;
use jobgate_domain::{
    CountingMode, RateLimitExceeded, RateLimitStatus, RequestOutcome, ThrottleBucket,
    ThrottleBucketKey, ThrottleCategory, ThrottleIdentity, ThrottlePolicy,
};

use crate::Clock;

use super::config::ThrottlePolicies;
use super::ports::{BucketSnapshot, ThrottleStore};

/// Admission verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// The request may proceed.
    Allowed(RateLimitStatus),
    /// The caller must wait for the window to close.
    Rejected(RateLimitExceeded),
}

impl ThrottleDecision {
    /// Returns whether the request was admitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

/// Application service for per-category request throttling.
#[derive(Clone)]
pub struct ThrottleService {
    store: Arc<dyn ThrottleStore>,
    clock: Arc<dyn Clock>,
    policies: Arc<ThrottlePolicies>,
}

impl ThrottleService {
    /// Creates a throttle service.
    #[must_use]
    pub fn new(
        store: Arc<dyn ThrottleStore>,
        clock: Arc<dyn Clock>,
        policies: ThrottlePolicies,
    ) -> Self {
        Self {
            store,
            clock,
            policies: Arc::new(policies),
        }
    }

    /// Returns the active policy table.
    #[must_use]
    pub fn policies(&self) -> &ThrottlePolicies {
        &self.policies
    }

    /// Returns the current time according to the service clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Decides whether a request from `identity` may proceed.
    ///
    /// `outcome` is consulted only by categories that count failed requests
    /// only: a known success peeks at the bucket without counting. Every
    /// other call counts, so middleware that does not yet know the outcome
    /// passes `None` and follows up with [`ThrottleService::settle`].
    pub async fn admit(
        &self,
        category: ThrottleCategory,
        identity: &ThrottleIdentity,
        outcome: Option<RequestOutcome>,
    ) -> AppResult<ThrottleDecision> {
        let policy = self.policies.get(category);
        let key = ThrottleBucketKey::new(category, identity.clone()).to_string();
        let now = self.clock.now();

        if policy.counting() == CountingMode::FailedRequestsOnly
            && outcome == Some(RequestOutcome::Success)
        {
            let snapshot = self.store.peek(&key, policy.window(), now).await?;
            return Ok(match snapshot {
                Some(snapshot) if snapshot.count >= policy.limit() => {
                    ThrottleDecision::Rejected(rejection(policy, &snapshot, now))
                }
                Some(snapshot) => ThrottleDecision::Allowed(allowance(policy, &snapshot)),
                None => ThrottleDecision::Allowed(RateLimitStatus {
                    limit: policy.limit(),
                    remaining: policy.limit(),
                    resets_at: now + policy.window(),
                }),
            });
        }

        let snapshot = self.store.record_hit(&key, policy.window(), now).await?;
        if snapshot.count > policy.limit() {
            return Ok(ThrottleDecision::Rejected(rejection(policy, &snapshot, now)));
        }

        Ok(ThrottleDecision::Allowed(allowance(policy, &snapshot)))
    }

    /// Like [`ThrottleService::admit`] but maps a rejection to
    /// `AppError::RateLimited`.
    pub async fn check(
        &self,
        category: ThrottleCategory,
        identity: &ThrottleIdentity,
        outcome: Option<RequestOutcome>,
    ) -> AppResult<RateLimitStatus> {
        match self.admit(category, identity, outcome).await? {
            ThrottleDecision::Allowed(status) => Ok(status),
            ThrottleDecision::Rejected(exceeded) => Err(exceeded.into()),
        }
    }

    /// Reconciles a provisionally counted request once its outcome is known.
    ///
    /// Categories that count failed requests only give the hit back when the
    /// request succeeded. Other categories are left untouched. Returns the
    /// status as it stands after reconciliation.
    pub async fn settle(
        &self,
        category: ThrottleCategory,
        identity: &ThrottleIdentity,
        admitted: &RateLimitStatus,
        outcome: RequestOutcome,
    ) -> AppResult<RateLimitStatus> {
        let policy = self.policies.get(category);
        if policy.counting() != CountingMode::FailedRequestsOnly
            || outcome != RequestOutcome::Success
        {
            return Ok(*admitted);
        }

        let key = ThrottleBucketKey::new(category, identity.clone()).to_string();
        let window_started_at = admitted.resets_at - policy.window();
        self.store.release_hit(&key, window_started_at).await?;

        Ok(RateLimitStatus {
            remaining: admitted.remaining.saturating_add(1).min(admitted.limit),
            ..*admitted
        })
    }

    /// Returns the bucket's active window, if any.
    pub async fn inspect(
        &self,
        category: ThrottleCategory,
        identity: &ThrottleIdentity,
    ) -> AppResult<Option<ThrottleBucket>> {
        let policy = self.policies.get(category);
        let bucket_key = ThrottleBucketKey::new(category, identity.clone());
        let snapshot = self
            .store
            .peek(&bucket_key.to_string(), policy.window(), self.clock.now())
            .await?;

        Ok(snapshot.map(|snapshot| {
            ThrottleBucket::new(bucket_key, snapshot.window_started_at, snapshot.count, policy)
        }))
    }

    /// Deletes a bucket so its identity starts over. Returns whether one existed.
    pub async fn reset(
        &self,
        category: ThrottleCategory,
        identity: &ThrottleIdentity,
    ) -> AppResult<bool> {
        let key = ThrottleBucketKey::new(category, identity.clone()).to_string();
        self.store.reset(&key).await
    }

    /// Removes buckets whose window has closed. Intended for periodic cleanup.
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        self.store.sweep_expired(self.clock.now()).await
    }
}

fn allowance(policy: &ThrottlePolicy, snapshot: &BucketSnapshot) -> RateLimitStatus {
    RateLimitStatus {
        limit: policy.limit(),
        remaining: policy.limit().saturating_sub(snapshot.count),
        resets_at: snapshot.window_started_at + policy.window(),
    }
}

fn rejection(
    policy: &ThrottlePolicy,
    snapshot: &BucketSnapshot,
    now: DateTime<Utc>,
) -> RateLimitExceeded {
    let resets_at = snapshot.window_started_at + policy.window();
    RateLimitExceeded {
        category: policy.category(),
        message: policy.message().to_owned(),
        limit: policy.limit(),
        retry_after: resets_at - now,
        resets_at,
    }
}
