//! Email delivery that writes messages to the log instead of sending them.

use async_trait::async_trait;
use jobgate_application::EmailService;
use jobgate_core::AppResult;
use tracing::info;

/// Development email service. Password reset links show up in the API logs.
#[derive(Clone, Default)]
pub struct ConsoleEmailService;

impl ConsoleEmailService {
    /// Creates a console email service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailService for ConsoleEmailService {
    async fn send_email(&self, to: &str, subject: &str, text_body: &str) -> AppResult<()> {
        info!(to, subject, body = text_body, "email written to console");
        Ok(())
    }
}
