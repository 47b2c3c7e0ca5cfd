//! Jobgate throttle maintenance worker.
//!
//! Deletes closed throttle windows from the shared bucket store so durable
//! backends do not grow without bound.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use jobgate_application::{SystemClock, ThrottlePolicies, ThrottleService, ThrottleStore};
use jobgate_core::{AppError, AppResult};
use jobgate_infrastructure::{PostgresThrottleStore, RedisThrottleStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const THROTTLE_KEY_PREFIX: &str = "jobgate:throttle";
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SweepTarget {
    Postgres { database_url: String },
    Redis { redis_url: String },
}

impl SweepTarget {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "postgres",
            Self::Redis { .. } => "redis",
        }
    }
}

#[derive(Debug, Clone)]
struct WorkerConfig {
    target: SweepTarget,
    sweep_interval_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let store = build_store(&config.target).await?;
    let service = ThrottleService::new(
        store,
        Arc::new(SystemClock),
        ThrottlePolicies::defaults(),
    );

    info!(
        throttle_store = config.target.as_str(),
        sweep_interval_seconds = config.sweep_interval_seconds,
        "jobgate-worker started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.sweep_interval_seconds));
    loop {
        interval.tick().await;

        match service.sweep_expired().await {
            Ok(0) => debug!("no expired throttle buckets"),
            Ok(removed) => info!(removed, "swept expired throttle buckets"),
            Err(error) => warn!(
                throttle_store = config.target.as_str(),
                error = %error,
                "failed to sweep throttle buckets"
            ),
        }
    }
}

async fn build_store(target: &SweepTarget) -> AppResult<Arc<dyn ThrottleStore>> {
    let store: Arc<dyn ThrottleStore> = match target {
        SweepTarget::Postgres { database_url } => {
            Arc::new(PostgresThrottleStore::new(connect_pool(database_url).await?))
        }
        SweepTarget::Redis { redis_url } => {
            let client = redis::Client::open(redis_url.as_str())
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Arc::new(RedisThrottleStore::new(client, THROTTLE_KEY_PREFIX))
        }
    };

    Ok(store)
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            non_empty(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };

        let store = non_empty("THROTTLE_STORE").unwrap_or_else(|| "postgres".to_owned());
        let target = match store.to_ascii_lowercase().as_str() {
            "postgres" => SweepTarget::Postgres {
                database_url: required("DATABASE_URL")?,
            },
            "redis" => SweepTarget::Redis {
                redis_url: required("REDIS_URL")?,
            },
            "memory" => {
                return Err(AppError::Validation(
                    "the worker cannot sweep the API's in-memory throttle store".to_owned(),
                ));
            }
            other => {
                return Err(AppError::Validation(format!(
                    "THROTTLE_STORE must be one of 'memory', 'redis' or 'postgres', got '{other}'"
                )));
            }
        };

        let sweep_interval_seconds = match non_empty("WORKER_SWEEP_INTERVAL_SECONDS") {
            Some(value) => value.parse::<u64>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid WORKER_SWEEP_INTERVAL_SECONDS value '{value}': {error}"
                ))
            })?,
            None => DEFAULT_SWEEP_INTERVAL_SECONDS,
        };
        if sweep_interval_seconds == 0 {
            return Err(AppError::Validation(
                "WORKER_SWEEP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            target,
            sweep_interval_seconds,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use jobgate_core::AppResult;

    use super::{DEFAULT_SWEEP_INTERVAL_SECONDS, SweepTarget, WorkerConfig};

    fn config_from(pairs: &[(&str, &str)]) -> AppResult<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        WorkerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_postgres() -> AppResult<()> {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/jobgate")])?;

        assert_eq!(
            config.target,
            SweepTarget::Postgres {
                database_url: "postgres://localhost/jobgate".to_owned()
            }
        );
        assert_eq!(config.sweep_interval_seconds, DEFAULT_SWEEP_INTERVAL_SECONDS);
        Ok(())
    }

    #[test]
    fn redis_requires_a_url() {
        assert!(config_from(&[("THROTTLE_STORE", "redis")]).is_err());

        let config = config_from(&[
            ("THROTTLE_STORE", "Redis"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
            ("WORKER_SWEEP_INTERVAL_SECONDS", "30"),
        ]);
        assert!(matches!(
            config.map(|config| (config.target, config.sweep_interval_seconds)),
            Ok((SweepTarget::Redis { .. }, 30))
        ));
    }

    #[test]
    fn memory_store_and_zero_interval_are_rejected() {
        assert!(config_from(&[("THROTTLE_STORE", "memory")]).is_err());
        assert!(
            config_from(&[
                ("DATABASE_URL", "postgres://localhost/jobgate"),
                ("WORKER_SWEEP_INTERVAL_SECONDS", "0"),
            ])
            .is_err()
        );
    }
}
