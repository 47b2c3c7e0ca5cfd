use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::{ForgotPasswordRequest, GenericMessageResponse, ResetPasswordRequest};
use crate::error::ApiResult;
use crate::state::AppState;

/// POST /api/auth/forgot-password
///
/// Answers the same way whether or not the email has an account.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<(StatusCode, Json<GenericMessageResponse>)> {
    state
        .password_reset_service
        .request_password_reset(&payload.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenericMessageResponse {
            message: "if an account exists for that email, a reset link has been sent".to_owned(),
        }),
    ))
}

/// POST /api/auth/reset-password
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<StatusCode> {
    state
        .password_reset_service
        .reset_password(&payload.token, &payload.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
