//! Submission endpoints guarded by their throttle categories. They validate
//! and acknowledge input; persistence belongs to other services.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use jobgate_core::{AppError, NonEmptyString, UserIdentity, UserRole};
use tracing::info;
use uuid::Uuid;

use crate::dto::{JobApplicationRequest, MessageRequest, ReceiptResponse, UploadReceiptResponse};
use crate::error::ApiResult;

const COVER_LETTER_MAX_CHARS: usize = 5_000;
const MESSAGE_MAX_CHARS: usize = 2_000;

/// POST /api/jobs/{job_id}/applications
pub async fn submit_application_handler(
    Extension(user): Extension<UserIdentity>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<JobApplicationRequest>,
) -> ApiResult<(StatusCode, Json<ReceiptResponse>)> {
    if user.role() != UserRole::JobSeeker {
        return Err(AppError::Forbidden("only job seekers can apply to jobs".to_owned()).into());
    }

    if payload
        .cover_letter
        .as_deref()
        .is_some_and(|letter| letter.chars().count() > COVER_LETTER_MAX_CHARS)
    {
        return Err(AppError::Validation(format!(
            "cover letter must be at most {COVER_LETTER_MAX_CHARS} characters"
        ))
        .into());
    }

    if let Some(resume_url) = payload.resume_url.as_deref() {
        url::Url::parse(resume_url)
            .map_err(|error| AppError::Validation(format!("invalid resume_url: {error}")))?;
    }

    let receipt = new_receipt();
    info!(
        applicant = %user.subject(),
        job_id = %job_id,
        receipt_id = %receipt.id,
        "job application received"
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /api/messages
pub async fn send_message_handler(
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<MessageRequest>,
) -> ApiResult<(StatusCode, Json<ReceiptResponse>)> {
    let recipient = NonEmptyString::new(payload.recipient_id)?;
    let body = NonEmptyString::new(payload.body)?;
    if body.as_str().chars().count() > MESSAGE_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "message must be at most {MESSAGE_MAX_CHARS} characters"
        ))
        .into());
    }
    if recipient.as_str() == user.subject() {
        return Err(AppError::Validation("cannot message yourself".to_owned()).into());
    }

    let receipt = new_receipt();
    info!(
        sender = %user.subject(),
        recipient = %recipient.as_str(),
        receipt_id = %receipt.id,
        "message received"
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /api/uploads
///
/// The body size ceiling is enforced by the route's body limit layer.
pub async fn upload_handler(
    Extension(user): Extension<UserIdentity>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadReceiptResponse>)> {
    if body.is_empty() {
        return Err(AppError::Validation("upload body must not be empty".to_owned()).into());
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);
    let size_bytes = u64::try_from(body.len()).unwrap_or(u64::MAX);
    let receipt = new_receipt();

    info!(
        uploader = %user.subject(),
        receipt_id = %receipt.id,
        size_bytes,
        "upload received"
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadReceiptResponse {
            id: receipt.id,
            received_at: receipt.received_at,
            content_type,
            size_bytes,
        }),
    ))
}

fn new_receipt() -> ReceiptResponse {
    ReceiptResponse {
        id: Uuid::new_v4().to_string(),
        received_at: Utc::now().to_rfc3339(),
    }
}
