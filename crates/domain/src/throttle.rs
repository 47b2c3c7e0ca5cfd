//! Request throttle domain types.
//!
//! Each route category owns an independent fixed-window counter per caller
//! identity. Policies, identities and buckets live here; counting and storage
//! are application and infrastructure concerns.

use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use jobgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Longest window a policy may use (30 days).
pub const MAX_WINDOW_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Named route group with its own limit and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThrottleCategory {
    /// Every API request.
    General,
    /// Login attempts.
    Auth,
    /// Account registration.
    Register,
    /// Password reset requests and confirmations.
    PasswordReset,
    /// Job applications.
    Application,
    /// Direct messages.
    Message,
    /// File uploads.
    Upload,
    /// Admin actions.
    Admin,
}

impl ThrottleCategory {
    /// All categories in policy-table order.
    pub const ALL: [Self; 8] = [
        Self::General,
        Self::Auth,
        Self::Register,
        Self::PasswordReset,
        Self::Application,
        Self::Message,
        Self::Upload,
        Self::Admin,
    ];

    /// Returns the stable slug used in bucket keys and configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Register => "register",
            Self::PasswordReset => "password-reset",
            Self::Application => "application",
            Self::Message => "message",
            Self::Upload => "upload",
            Self::Admin => "admin",
        }
    }

    /// Returns the environment variable prefix for per-category overrides,
    /// e.g. `THROTTLE_PASSWORD_RESET`.
    #[must_use]
    pub fn env_prefix(&self) -> String {
        format!(
            "THROTTLE_{}",
            self.as_str().replace('-', "_").to_ascii_uppercase()
        )
    }
}

impl Display for ThrottleCategory {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ThrottleCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown throttle category '{value}'")))
    }
}

/// Which requests count against a category's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingMode {
    /// Every admitted request increments the bucket.
    EveryRequest,
    /// Only unsuccessful requests increment the bucket.
    FailedRequestsOnly,
}

/// Outcome of a request, as seen by failure-counting categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request succeeded.
    Success,
    /// The request failed (bad credentials, validation error, ...).
    Failure,
}

impl RequestOutcome {
    /// Classifies an HTTP status code: anything below 400 is a success.
    #[must_use]
    pub fn from_status_code(status: u16) -> Self {
        if status < 400 {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Limit, window and rejection message for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrottlePolicy {
    category: ThrottleCategory,
    limit: u32,
    window_seconds: i64,
    counting: CountingMode,
    message: String,
}

impl ThrottlePolicy {
    /// Creates a validated policy.
    pub fn new(
        category: ThrottleCategory,
        limit: u32,
        window_seconds: i64,
        counting: CountingMode,
        message: impl Into<String>,
    ) -> AppResult<Self> {
        if limit == 0 {
            return Err(AppError::Validation(format!(
                "throttle limit for '{category}' must be greater than zero"
            )));
        }

        if window_seconds <= 0 || window_seconds > MAX_WINDOW_SECONDS {
            return Err(AppError::Validation(format!(
                "throttle window for '{category}' must be between 1 and {MAX_WINDOW_SECONDS} seconds"
            )));
        }

        let message = message.into();
        if message.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "throttle message for '{category}' must not be empty"
            )));
        }

        Ok(Self {
            category,
            limit,
            window_seconds,
            counting,
            message,
        })
    }

    /// Returns the built-in policy for a category.
    #[must_use]
    pub fn default_for(category: ThrottleCategory) -> Self {
        const MINUTE: i64 = 60;
        const HOUR: i64 = 60 * MINUTE;

        let (limit, window_seconds, counting, message) = match category {
            ThrottleCategory::General => (
                100,
                15 * MINUTE,
                CountingMode::EveryRequest,
                "Too many requests from this IP, please try again after 15 minutes",
            ),
            ThrottleCategory::Auth => (
                5,
                15 * MINUTE,
                CountingMode::FailedRequestsOnly,
                "Too many login attempts, please try again after 15 minutes",
            ),
            ThrottleCategory::Register => (
                3,
                HOUR,
                CountingMode::EveryRequest,
                "Too many accounts created from this IP, please try again after an hour",
            ),
            ThrottleCategory::PasswordReset => (
                3,
                HOUR,
                CountingMode::EveryRequest,
                "Too many password reset attempts, please try again after an hour",
            ),
            ThrottleCategory::Application => (
                20,
                HOUR,
                CountingMode::EveryRequest,
                "Too many job applications submitted, please try again after an hour",
            ),
            ThrottleCategory::Message => (
                30,
                MINUTE,
                CountingMode::EveryRequest,
                "Too many messages sent, please slow down",
            ),
            ThrottleCategory::Upload => (
                10,
                15 * MINUTE,
                CountingMode::EveryRequest,
                "Too many file uploads, please try again after 15 minutes",
            ),
            ThrottleCategory::Admin => (
                50,
                MINUTE,
                CountingMode::EveryRequest,
                "Too many admin actions, please slow down",
            ),
        };

        Self {
            category,
            limit,
            window_seconds,
            counting,
            message: message.to_owned(),
        }
    }

    /// Returns a copy with a different limit and/or window.
    pub fn with_overrides(&self, limit: Option<u32>, window_seconds: Option<i64>) -> AppResult<Self> {
        Self::new(
            self.category,
            limit.unwrap_or(self.limit),
            window_seconds.unwrap_or(self.window_seconds),
            self.counting,
            self.message.clone(),
        )
    }

    /// Returns the category this policy guards.
    #[must_use]
    pub fn category(&self) -> ThrottleCategory {
        self.category
    }

    /// Returns the request ceiling per window.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the window length in seconds.
    #[must_use]
    pub fn window_seconds(&self) -> i64 {
        self.window_seconds
    }

    /// Returns the window length.
    #[must_use]
    pub fn window(&self) -> TimeDelta {
        TimeDelta::seconds(self.window_seconds)
    }

    /// Returns which requests count against the limit.
    #[must_use]
    pub fn counting(&self) -> CountingMode {
        self.counting
    }

    /// Returns the rejection message shown to callers.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Key used to attribute requests to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThrottleIdentity {
    /// Authenticated user identifier.
    User(String),
    /// Caller network address.
    Address(IpAddr),
    /// Caller whose network address could not be determined.
    UnknownAddress,
}

impl ThrottleIdentity {
    /// Creates a user identity, rejecting blank identifiers.
    pub fn user(subject: impl Into<String>) -> AppResult<Self> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(AppError::Validation(
                "throttle user identity must not be empty".to_owned(),
            ));
        }

        Ok(Self::User(subject))
    }
}

impl Display for ThrottleIdentity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(subject) => write!(formatter, "user:{subject}"),
            Self::Address(address) => write!(formatter, "ip:{address}"),
            Self::UnknownAddress => formatter.write_str("ip:unknown"),
        }
    }
}

impl FromStr for ThrottleIdentity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((kind, rest)) = value.split_once(':') else {
            return Err(AppError::Validation(format!(
                "throttle identity '{value}' must be 'user:<id>' or 'ip:<address>'"
            )));
        };

        match kind {
            "user" => Self::user(rest),
            "ip" if rest == "unknown" => Ok(Self::UnknownAddress),
            "ip" => rest.parse::<IpAddr>().map(Self::Address).map_err(|error| {
                AppError::Validation(format!("invalid throttle identity address '{rest}': {error}"))
            }),
            _ => Err(AppError::Validation(format!(
                "unknown throttle identity kind '{kind}'"
            ))),
        }
    }
}

/// Address of one bucket: a category paired with an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleBucketKey {
    category: ThrottleCategory,
    identity: ThrottleIdentity,
}

impl ThrottleBucketKey {
    /// Creates a bucket key.
    #[must_use]
    pub fn new(category: ThrottleCategory, identity: ThrottleIdentity) -> Self {
        Self { category, identity }
    }

    /// Returns the category component.
    #[must_use]
    pub fn category(&self) -> ThrottleCategory {
        self.category
    }

    /// Returns the identity component.
    #[must_use]
    pub fn identity(&self) -> &ThrottleIdentity {
        &self.identity
    }
}

impl Display for ThrottleBucketKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.category, self.identity)
    }
}

/// Whether a bucket currently admits counted requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketState {
    /// `count < limit`.
    Open,
    /// `count >= limit` until the window closes.
    Closed,
}

/// Request counter for one identity in one category's current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleBucket {
    key: ThrottleBucketKey,
    window_started_at: DateTime<Utc>,
    count: u32,
    limit: u32,
    window_seconds: i64,
}

impl ThrottleBucket {
    /// Creates a bucket snapshot.
    #[must_use]
    pub fn new(
        key: ThrottleBucketKey,
        window_started_at: DateTime<Utc>,
        count: u32,
        policy: &ThrottlePolicy,
    ) -> Self {
        Self {
            key,
            window_started_at,
            count,
            limit: policy.limit(),
            window_seconds: policy.window_seconds(),
        }
    }

    /// Returns the bucket address.
    #[must_use]
    pub fn key(&self) -> &ThrottleBucketKey {
        &self.key
    }

    /// Returns the start of the current window.
    #[must_use]
    pub fn window_started_at(&self) -> DateTime<Utc> {
        self.window_started_at
    }

    /// Returns when the current window closes.
    #[must_use]
    pub fn window_ends_at(&self) -> DateTime<Utc> {
        self.window_started_at + TimeDelta::seconds(self.window_seconds)
    }

    /// Returns the number of counted requests in the window.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the ceiling for the window.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns how many more counted requests the window admits.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }

    /// Returns whether the window has closed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.window_ends_at()
    }

    /// Returns the bucket state at `now`. An expired bucket is open.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> BucketState {
        if !self.is_expired(now) && self.count >= self.limit {
            BucketState::Closed
        } else {
            BucketState::Open
        }
    }
}

/// Limit bookkeeping returned for an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Ceiling for the window.
    pub limit: u32,
    /// Counted requests still available in the window.
    pub remaining: u32,
    /// When the current window closes.
    pub resets_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Whole seconds until the window closes, rounded up.
    #[must_use]
    pub fn reset_after_seconds(&self, now: DateTime<Utc>) -> u64 {
        ceil_seconds(self.resets_at - now)
    }
}

/// Rejection raised when a caller exceeds a category's limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Category whose limit was exceeded.
    pub category: ThrottleCategory,
    /// Human-readable message for the caller.
    pub message: String,
    /// Ceiling for the window.
    pub limit: u32,
    /// Time until the window closes.
    pub retry_after: TimeDelta,
    /// When the window closes.
    pub resets_at: DateTime<Utc>,
}

impl RateLimitExceeded {
    /// Whole seconds the caller should wait, rounded up and at least one.
    #[must_use]
    pub fn retry_after_seconds(&self) -> u64 {
        ceil_seconds(self.retry_after).max(1)
    }
}

impl From<RateLimitExceeded> for AppError {
    fn from(value: RateLimitExceeded) -> Self {
        let retry_after_seconds = value.retry_after_seconds();
        AppError::RateLimited {
            message: value.message,
            retry_after_seconds,
        }
    }
}

fn ceil_seconds(delta: TimeDelta) -> u64 {
    if delta <= TimeDelta::zero() {
        return 0;
    }

    let whole = delta.num_seconds();
    let has_fraction = delta.subsec_nanos() > 0;
    u64::try_from(whole).unwrap_or(0) + u64::from(has_fraction)
}
