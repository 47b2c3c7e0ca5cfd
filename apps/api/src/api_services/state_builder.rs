use std::sync::Arc;
use std::time::Duration;

use jobgate_application::{
    Clock, PasswordHasher, PasswordResetService, SystemClock, ThrottleService, ThrottleStore,
    UserService,
};
use jobgate_core::AppError;
use jobgate_infrastructure::{
    Argon2PasswordHasher, ConsoleEmailService, InMemoryPasswordResetTokenRepository,
    InMemoryThrottleStore, InMemoryUserRepository, PostgresThrottleStore, RedisThrottleStore,
};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api_config::{ApiConfig, StoreBackend};
use crate::client_identity::ClientAddressResolver;
use crate::state::AppState;

const THROTTLE_KEY_PREFIX: &str = "jobgate:throttle";

pub fn build_app_state(
    config: &ApiConfig,
    pool: Option<PgPool>,
    redis_client: Option<redis::Client>,
) -> Result<AppState, AppError> {
    let throttle_store: Arc<dyn ThrottleStore> = match config.throttle_store {
        StoreBackend::Memory => Arc::new(InMemoryThrottleStore::new()),
        StoreBackend::Redis => {
            let client = redis_client.ok_or_else(|| {
                AppError::Validation("REDIS_URL is required for the redis throttle store".to_owned())
            })?;
            Arc::new(RedisThrottleStore::new(client, THROTTLE_KEY_PREFIX))
        }
        StoreBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                AppError::Validation(
                    "DATABASE_URL is required for the postgres throttle store".to_owned(),
                )
            })?;
            Arc::new(PostgresThrottleStore::new(pool))
        }
    };

    Ok(assemble_app_state(
        config,
        throttle_store,
        Arc::new(SystemClock),
        Arc::new(Argon2PasswordHasher::new()),
    ))
}

/// Wires services around an explicit store, clock and hasher.
pub(crate) fn assemble_app_state(
    config: &ApiConfig,
    throttle_store: Arc<dyn ThrottleStore>,
    clock: Arc<dyn Clock>,
    password_hasher: Arc<dyn PasswordHasher>,
) -> AppState {
    let user_repository = Arc::new(InMemoryUserRepository::new());

    let user_service = UserService::new(user_repository.clone(), password_hasher.clone())
        .with_admin_emails(config.admin_emails.iter().cloned());
    let password_reset_service = PasswordResetService::new(
        user_repository,
        Arc::new(InMemoryPasswordResetTokenRepository::new()),
        Arc::new(ConsoleEmailService::new()),
        password_hasher,
        clock.clone(),
        config.frontend_url.clone(),
    );
    let throttle_service =
        ThrottleService::new(throttle_store, clock, config.throttle_policies.clone());

    AppState {
        throttle_service,
        throttle_store: config.throttle_store,
        user_service,
        password_reset_service,
        client_addresses: ClientAddressResolver::new(config.trusted_proxies.clone()),
        upload_max_bytes: config.upload_max_bytes,
    }
}

/// Periodically drops closed windows from a process-local store.
pub fn spawn_throttle_sweeper(service: ThrottleService, interval_seconds: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
        interval.tick().await;

        loop {
            interval.tick().await;
            match service.sweep_expired().await {
                Ok(removed) => debug!(removed, "swept expired throttle buckets"),
                Err(error) => warn!(error = %error, "failed to sweep throttle buckets"),
            }
        }
    })
}
