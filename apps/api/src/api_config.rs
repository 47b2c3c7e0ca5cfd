use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use ipnet::IpNet;
use jobgate_application::ThrottlePolicies;
use jobgate_core::AppError;
use tracing_subscriber::EnvFilter;
use url::Url;


const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Backend that holds throttle buckets or sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
            Self::Postgres => "postgres",
        }
    }

    fn parse(name: &str, value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "postgres" => Ok(Self::Postgres),
            other => Err(AppError::Validation(format!(
                "{name} must be one of 'memory', 'redis' or 'postgres', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub frontend_url: String,
    pub frontend_origin: String,
    pub cookie_secure: bool,
    pub throttle_store: StoreBackend,
    pub session_store: StoreBackend,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub trusted_proxies: Vec<IpNet>,
    pub admin_emails: Vec<String>,
    pub upload_max_bytes: usize,
    pub throttle_sweep_interval_seconds: u64,
    pub throttle_policies: ThrottlePolicies,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(|name| env::var(name).ok(), migrate_only)
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F, migrate_only: bool) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_host = non_empty("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = match non_empty("API_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))?,
            None => 3001,
        };

        let frontend_url =
            non_empty("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_owned());
        let parsed_frontend_url = Url::parse(frontend_url.trim())
            .map_err(|error| AppError::Validation(format!("invalid FRONTEND_URL: {error}")))?;
        let frontend_origin = parsed_frontend_url.origin().ascii_serialization();
        if frontend_origin == "null" {
            return Err(AppError::Validation(
                "FRONTEND_URL must be an http(s) URL".to_owned(),
            ));
        }

        let cookie_secure = non_empty("SESSION_COOKIE_SECURE")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

        let throttle_store = non_empty("THROTTLE_STORE")
            .map(|value| StoreBackend::parse("THROTTLE_STORE", &value))
            .transpose()?
            .unwrap_or(StoreBackend::Memory);
        let session_store = non_empty("SESSION_STORE")
            .map(|value| StoreBackend::parse("SESSION_STORE", &value))
            .transpose()?
            .unwrap_or(StoreBackend::Memory);

        let database_url = non_empty("DATABASE_URL");
        let redis_url = non_empty("REDIS_URL");
        let uses = |backend| throttle_store == backend || session_store == backend;
        if (uses(StoreBackend::Postgres) || migrate_only) && database_url.is_none() {
            return Err(AppError::Validation(
                "DATABASE_URL is required for the postgres stores".to_owned(),
            ));
        }
        if uses(StoreBackend::Redis) && redis_url.is_none() {
            return Err(AppError::Validation(
                "REDIS_URL is required for the redis stores".to_owned(),
            ));
        }

        let trusted_proxies = non_empty("TRUSTED_PROXIES")
            .map(|value| parse_trusted_proxies(&value))
            .transpose()?
            .unwrap_or_default();

        let admin_emails = non_empty("ADMIN_EMAILS")
            .map(|value| {
                value
                    .split(',')
                    .map(|email| email.trim().to_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let upload_max_bytes =
            parse_positive(&non_empty, "UPLOAD_MAX_BYTES")?.unwrap_or(DEFAULT_UPLOAD_MAX_BYTES);
        let throttle_sweep_interval_seconds =
            parse_positive(&non_empty, "THROTTLE_SWEEP_INTERVAL_SECONDS")?
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS);

        let throttle_policies = ThrottlePolicies::from_lookup(&non_empty)?;

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            frontend_url,
            frontend_origin,
            cookie_secure,
            throttle_store,
            session_store,
            database_url,
            redis_url,
            trusted_proxies,
            admin_emails,
            upload_max_bytes,
            throttle_sweep_interval_seconds,
            throttle_policies,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Validation(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    pub fn requires_postgres(&self) -> bool {
        self.migrate_only
            || self.throttle_store == StoreBackend::Postgres
            || self.session_store == StoreBackend::Postgres
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_trusted_proxies(value: &str) -> Result<Vec<IpNet>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            // Bare addresses are single-host ranges.
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                .map_err(|error| {
                    AppError::Validation(format!("invalid TRUSTED_PROXIES entry '{entry}': {error}"))
                })
        })
        .collect()
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, AppError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    let parsed = value
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))?;
    if parsed <= T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(Some(parsed))
}
