use axum::Json;
use axum::extract::Extension;
use axum::http::StatusCode;
use jobgate_core::{AppError, UserIdentity};
use tower_sessions::Session;

use crate::dto::UserResponse;
use crate::error::ApiResult;

/// POST /api/auth/logout
pub async fn logout_handler(session: Session) -> ApiResult<StatusCode> {
    session
        .delete()
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete session: {error}")))?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me_handler(Extension(identity): Extension<UserIdentity>) -> Json<UserResponse> {
    Json(UserResponse::from(&identity))
}
