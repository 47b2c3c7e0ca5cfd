use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use jobgate_core::AppError;
use tower_http::cors::CorsLayer;

use crate::middleware::{RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET};

pub(super) fn build_cors_layer(frontend_origin: &str) -> Result<CorsLayer, AppError> {
    Ok(CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(frontend_origin)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([
            RATE_LIMIT_LIMIT.clone(),
            RATE_LIMIT_REMAINING.clone(),
            RATE_LIMIT_RESET.clone(),
            HeaderName::from_static("retry-after"),
        ]))
}
