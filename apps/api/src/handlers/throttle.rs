use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use jobgate_core::{AppError, UserIdentity};
use jobgate_domain::{ThrottleCategory, ThrottleIdentity};
use tracing::info;

use crate::dto::{ThrottleBucketResponse, ThrottlePolicyResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_policies_handler(
    State(state): State<AppState>,
) -> Json<Vec<ThrottlePolicyResponse>> {
    Json(
        state
            .throttle_service
            .policies()
            .iter()
            .map(ThrottlePolicyResponse::from)
            .collect(),
    )
}

pub async fn get_bucket_handler(
    State(state): State<AppState>,
    Path((category, identity)): Path<(String, String)>,
) -> ApiResult<Json<ThrottleBucketResponse>> {
    let (category, identity) = parse_bucket_path(&category, &identity)?;

    let bucket = state
        .throttle_service
        .inspect(category, &identity)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("no active '{category}' bucket for '{identity}'"))
        })?;

    Ok(Json(ThrottleBucketResponse::from_bucket(
        &bucket,
        state.throttle_service.now(),
    )))
}

pub async fn reset_bucket_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<UserIdentity>,
    Path((category, identity)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let (category, identity) = parse_bucket_path(&category, &identity)?;

    if !state.throttle_service.reset(category, &identity).await? {
        return Err(
            AppError::NotFound(format!("no '{category}' bucket for '{identity}'")).into(),
        );
    }

    info!(
        admin = %admin.subject(),
        category = %category,
        identity = %identity,
        "throttle bucket reset"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn parse_bucket_path(
    category: &str,
    identity: &str,
) -> Result<(ThrottleCategory, ThrottleIdentity), AppError> {
    Ok((category.parse()?, identity.parse()?))
}
