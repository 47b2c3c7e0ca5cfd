use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Extension, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jobgate_application::ThrottleDecision;
use jobgate_core::{AppError, UserIdentity};
use jobgate_domain::{RateLimitExceeded, RequestOutcome, ThrottleCategory};
use tower_sessions::Session;
use tracing::warn;

use crate::auth::SESSION_USER_KEY;
use crate::client_identity::throttle_identity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub static RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Counts the request against the category set by the surrounding
/// `Extension<ThrottleCategory>` layer and rejects it with 429 once the
/// caller's bucket is full.
pub async fn throttle(
    State(state): State<AppState>,
    Extension(category): Extension<ThrottleCategory>,
    session: Session,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let user = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?;
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());
    let address = state.client_addresses.resolve(peer, request.headers());
    let identity = throttle_identity(user.as_ref(), address);

    let admitted = match state
        .throttle_service
        .admit(category, &identity, None)
        .await?
    {
        ThrottleDecision::Allowed(status) => status,
        ThrottleDecision::Rejected(exceeded) => {
            warn!(
                category = %category,
                identity = %identity,
                limit = exceeded.limit,
                retry_after_seconds = exceeded.retry_after_seconds(),
                "request throttled"
            );
            return Ok(throttled_response(exceeded));
        }
    };

    let mut response = next.run(request).await;
    let outcome = RequestOutcome::from_status_code(response.status().as_u16());
    let status = match state
        .throttle_service
        .settle(category, &identity, &admitted, outcome)
        .await
    {
        Ok(status) => status,
        Err(error) => {
            warn!(
                category = %category,
                identity = %identity,
                error = %error,
                "failed to settle throttled request"
            );
            admitted
        }
    };

    // Inner layers run first, so the most specific category wins.
    let headers = response.headers_mut();
    if !headers.contains_key(&RATE_LIMIT_LIMIT) {
        let reset_after = status.reset_after_seconds(state.throttle_service.now());
        insert_rate_limit_headers(headers, status.limit, status.remaining, reset_after);
    }

    Ok(response)
}

fn throttled_response(exceeded: RateLimitExceeded) -> Response {
    let limit = exceeded.limit;
    let reset_after = exceeded.retry_after_seconds();

    let mut response = ApiError(exceeded.into()).into_response();
    insert_rate_limit_headers(response.headers_mut(), limit, 0, reset_after);
    response
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: u64) {
    headers.insert(&RATE_LIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(&RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(&RATE_LIMIT_RESET, HeaderValue::from(reset));
}

pub async fn require_auth(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Must run inside [`require_auth`].
pub async fn require_admin(
    Extension(identity): Extension<UserIdentity>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !identity.is_admin() {
        return Err(AppError::Forbidden("admin role required".to_owned()).into());
    }

    Ok(next.run(request).await)
}
