//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod throttle;
mod user;

pub use throttle::{
    BucketState, CountingMode, MAX_WINDOW_SECONDS, RateLimitExceeded, RateLimitStatus,
    RequestOutcome, ThrottleBucket, ThrottleBucketKey, ThrottleCategory, ThrottleIdentity,
    ThrottlePolicy,
};
pub use user::{
    EmailAddress, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, UserId, validate_password,
};
