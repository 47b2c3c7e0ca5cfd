//! Request throttle ports and application service.
//!
//! Each route category owns an independent fixed-window counter per caller
//! identity. The service decides admission; stores only count.

mod config;
mod ports;
mod service;


pub use config::ThrottlePolicies;
pub use ports::{BucketSnapshot, ThrottleStore};
pub use service::{ThrottleDecision, ThrottleService};
