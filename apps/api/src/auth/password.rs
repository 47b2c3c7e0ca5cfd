use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use jobgate_application::{AuthOutcome, RegisterParams};
use jobgate_core::{AppError, UserRole};
use tower_sessions::Session;
use tracing::info;

use crate::dto::{AuthLoginRequest, AuthRegisterRequest, UserResponse};
use crate::error::ApiResult;
use crate::state::AppState;

use super::SESSION_USER_KEY;

/// POST /api/auth/register
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<AuthRegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let role = payload
        .role
        .as_deref()
        .map(str::parse::<UserRole>)
        .transpose()?
        .unwrap_or(UserRole::JobSeeker);

    let user = state
        .user_service
        .register(RegisterParams {
            email: payload.email,
            password: payload.password,
            display_name: payload.display_name,
            role,
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, "account registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user.identity()))))
}

/// POST /api/auth/login
///
/// Failures are counted by the auth throttle; a success is given back.
pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<AuthLoginRequest>,
) -> ApiResult<Json<UserResponse>> {
    let AuthOutcome::Authenticated(user) = state
        .user_service
        .login(&payload.email, &payload.password)
        .await?
    else {
        return Err(AppError::Unauthorized("invalid email or password".to_owned()).into());
    };

    let identity = user.identity();

    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to cycle session id: {error}")))?;
    session
        .insert(SESSION_USER_KEY, &identity)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session identity: {error}"))
        })?;

    Ok(Json(UserResponse::from(&identity)))
}
