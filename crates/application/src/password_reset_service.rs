//! Password reset tokens and the forgot-password email flow.
//!
//! Tokens are random, stored only as SHA-256 hashes, single-use, and expire
//! after one hour.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use jobgate_core::{AppError, AppResult};
use jobgate_domain::{EmailAddress, UserId, validate_password};

use crate::{Clock, PasswordHasher, UserRepository};

mod token_crypto;

#[cfg(test)]
mod tests;

use token_crypto::{generate_token, hash_token};

/// Repository port for reset token persistence.
#[async_trait]
pub trait PasswordResetTokenRepository: Send + Sync {
    /// Stores a token hash for a user.
    async fn create_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Consumes an unexpired token, returning its user. A token can be
    /// consumed once.
    async fn consume_valid_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<UserId>>;

    /// Invalidates every outstanding token for a user.
    async fn invalidate_tokens_for_user(&self, user_id: UserId) -> AppResult<()>;
}

/// Port for sending emails.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends a plain-text email.
    async fn send_email(&self, to: &str, subject: &str, text_body: &str) -> AppResult<()>;
}

/// Application service for the forgot-password flow.
#[derive(Clone)]
pub struct PasswordResetService {
    user_repository: Arc<dyn UserRepository>,
    token_repository: Arc<dyn PasswordResetTokenRepository>,
    email_service: Arc<dyn EmailService>,
    password_hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    frontend_url: String,
}

impl PasswordResetService {
    /// Creates a password reset service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        token_repository: Arc<dyn PasswordResetTokenRepository>,
        email_service: Arc<dyn EmailService>,
        password_hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        frontend_url: String,
    ) -> Self {
        Self {
            user_repository,
            token_repository,
            email_service,
            password_hasher,
            clock,
            frontend_url,
        }
    }

    /// Issues a reset token and emails the reset link.
    ///
    /// Returns `Ok(())` whether or not the email belongs to an account so
    /// the endpoint cannot be used to enumerate users.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let Ok(email_address) = EmailAddress::new(email) else {
            return Ok(());
        };

        let Some(user) = self
            .user_repository
            .find_by_email(email_address.as_str())
            .await?
        else {
            return Ok(());
        };

        self.token_repository
            .invalidate_tokens_for_user(user.id)
            .await?;

        let (raw_token, token_hash) = generate_token()?;
        let expires_at = self.clock.now() + TimeDelta::hours(1);
        self.token_repository
            .create_token(user.id, &token_hash, expires_at)
            .await?;

        let reset_url = format!(
            "{}/reset-password?token={raw_token}",
            self.frontend_url.trim_end_matches('/')
        );
        let text_body = format!(
            "Hi {},\n\n\
             We received a request to reset your password.\n\
             Set a new one here:\n{reset_url}\n\n\
             This link expires in 1 hour. If you did not ask for it, ignore this email.",
            user.display_name
        );

        self.email_service
            .send_email(&user.email, "Reset your Jobgate password", &text_body)
            .await
    }

    /// Sets a new password using a reset token.
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> AppResult<()> {
        validate_password(new_password)?;

        let token_hash = hash_token(raw_token.trim());
        let user_id = self
            .token_repository
            .consume_valid_token(&token_hash, self.clock.now())
            .await?
            .ok_or_else(|| {
                AppError::Unauthorized("reset token is invalid or has expired".to_owned())
            })?;

        let password_hash = self.password_hasher.hash_password(new_password)?;
        self.user_repository
            .update_password(user_id, &password_hash)
            .await?;
        self.token_repository
            .invalidate_tokens_for_user(user_id)
            .await
    }
}
