use jobgate_core::UserIdentity;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for email/password registration.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/auth-register-request.ts"
)]
pub struct AuthRegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    /// `job_seeker` (default) or `recruiter`.
    pub role: Option<String>,
}

/// Incoming payload for email/password login.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/auth-login-request.ts"
)]
pub struct AuthLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/forgot-password-request.ts"
)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/reset-password-request.ts"
)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Account summary returned by register, login and `me`.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/user-response.ts"
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

impl From<&UserIdentity> for UserResponse {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            id: identity.subject().to_owned(),
            email: identity.email().to_owned(),
            display_name: identity.display_name().to_owned(),
            role: identity.role().as_str().to_owned(),
        }
    }
}

#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/generic-message-response.ts"
)]
pub struct GenericMessageResponse {
    pub message: String,
}
