use jobgate_domain::{BucketState, CountingMode, ThrottleBucket, ThrottlePolicy};
use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub throttle_store: &'static str,
}

/// One row of the active policy table.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/throttle-policy-response.ts"
)]
pub struct ThrottlePolicyResponse {
    pub category: String,
    pub limit: u32,
    pub window_seconds: i64,
    /// `every_request` or `failed_requests_only`.
    pub counting: String,
    pub message: String,
}

impl From<&ThrottlePolicy> for ThrottlePolicyResponse {
    fn from(policy: &ThrottlePolicy) -> Self {
        let counting = match policy.counting() {
            CountingMode::EveryRequest => "every_request",
            CountingMode::FailedRequestsOnly => "failed_requests_only",
        };

        Self {
            category: policy.category().as_str().to_owned(),
            limit: policy.limit(),
            window_seconds: policy.window_seconds(),
            counting: counting.to_owned(),
            message: policy.message().to_owned(),
        }
    }
}

/// Admin view of one bucket.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/throttle-bucket-response.ts"
)]
pub struct ThrottleBucketResponse {
    pub category: String,
    pub identity: String,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub window_started_at: String,
    pub window_ends_at: String,
    /// `open` or `closed`.
    pub state: String,
}

impl ThrottleBucketResponse {
    pub fn from_bucket(bucket: &ThrottleBucket, now: chrono::DateTime<chrono::Utc>) -> Self {
        let state = match bucket.state(now) {
            BucketState::Open => "open",
            BucketState::Closed => "closed",
        };

        Self {
            category: bucket.key().category().as_str().to_owned(),
            identity: bucket.key().identity().to_string(),
            count: bucket.count(),
            limit: bucket.limit(),
            remaining: bucket.remaining(),
            window_started_at: bucket.window_started_at().to_rfc3339(),
            window_ends_at: bucket.window_ends_at().to_rfc3339(),
            state: state.to_owned(),
        }
    }
}
