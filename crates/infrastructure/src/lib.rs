//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod console_email_service;
mod in_memory_password_reset_token_repository;
mod in_memory_throttle_store;
mod in_memory_user_repository;
mod postgres_throttle_store;
mod redis_throttle_store;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use console_email_service::ConsoleEmailService;
pub use in_memory_password_reset_token_repository::InMemoryPasswordResetTokenRepository;
pub use in_memory_throttle_store::InMemoryThrottleStore;
pub use in_memory_user_repository::InMemoryUserRepository;
pub use postgres_throttle_store::PostgresThrottleStore;
pub use redis_throttle_store::RedisThrottleStore;

/// Embedded SQL migrations for the PostgreSQL adapters.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
