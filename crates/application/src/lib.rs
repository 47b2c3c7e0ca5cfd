//! Application services and ports.

#![forbid(unsafe_code)]

mod clock;
mod password_reset_service;
mod throttle_service;
mod user_service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use password_reset_service::{
    EmailService, PasswordResetService, PasswordResetTokenRepository,
};
pub use throttle_service::{
    BucketSnapshot, ThrottleDecision, ThrottlePolicies, ThrottleService, ThrottleStore,
};
pub use user_service::{
    AuthOutcome, NewUserRecord, PasswordHasher, RegisterParams, UserRecord, UserRepository,
    UserService,
};
