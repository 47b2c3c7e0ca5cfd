use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/job-application-request.ts"
)]
pub struct JobApplicationRequest {
    pub cover_letter: Option<String>,
    pub resume_url: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/message-request.ts"
)]
pub struct MessageRequest {
    pub recipient_id: String,
    pub body: String,
}

/// Acknowledgement for an accepted submission.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/receipt-response.ts"
)]
pub struct ReceiptResponse {
    pub id: String,
    /// RFC 3339 timestamp.
    pub received_at: String,
}

#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/upload-receipt-response.ts"
)]
pub struct UploadReceiptResponse {
    pub id: String,
    pub received_at: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
}
