mod auth;
mod intake;
mod throttle;

pub use auth::{
    AuthLoginRequest, AuthRegisterRequest, ForgotPasswordRequest, GenericMessageResponse,
    ResetPasswordRequest, UserResponse,
};
pub use intake::{
    JobApplicationRequest, MessageRequest, ReceiptResponse, UploadReceiptResponse,
};
pub use throttle::{HealthResponse, ThrottleBucketResponse, ThrottlePolicyResponse};
