//! Jobgate API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod auth;
mod client_identity;
mod dto;
mod error;
mod handlers;
mod middleware;
mod redis_session_store;
mod state;

use std::net::SocketAddr;

use axum::Router;
use jobgate_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, StoreBackend, init_tracing};
use crate::api_router::build_router;
use crate::api_services::{
    build_app_state, build_memory_session_layer, build_postgres_session_layer,
    build_redis_client, build_redis_session_layer, connect_and_migrate, spawn_throttle_sweeper,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = match config.database_url.as_deref() {
        Some(database_url) if config.requires_postgres() => {
            Some(connect_and_migrate(database_url).await?)
        }
        _ => None,
    };

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let app_state = build_app_state(&config, pool.clone(), redis_client.clone())?;

    if config.throttle_store == StoreBackend::Memory {
        spawn_throttle_sweeper(
            app_state.throttle_service.clone(),
            config.throttle_sweep_interval_seconds,
        );
    }

    let app = match config.session_store {
        StoreBackend::Memory => build_router(
            app_state,
            &config.frontend_origin,
            build_memory_session_layer(config.cookie_secure),
        )?,
        StoreBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                AppError::Validation("DATABASE_URL is required for the postgres session store".to_owned())
            })?;
            build_router(
                app_state,
                &config.frontend_origin,
                build_postgres_session_layer(pool, config.cookie_secure).await?,
            )?
        }
        StoreBackend::Redis => {
            let client = redis_client.ok_or_else(|| {
                AppError::Validation("REDIS_URL is required for the redis session store".to_owned())
            })?;
            build_router(
                app_state,
                &config.frontend_origin,
                build_redis_session_layer(client, config.cookie_secure),
            )?
        }
    };

    serve(app, config.socket_address()?, &config).await
}

async fn serve(app: Router, address: SocketAddr, config: &ApiConfig) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(
        %address,
        throttle_store = config.throttle_store.as_str(),
        session_store = config.session_store.as_str(),
        trusted_proxies = config.trusted_proxies.len(),
        "jobgate-api listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
