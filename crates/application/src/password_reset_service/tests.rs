use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jobgate_core::{AppError, AppResult, UserRole};
use jobgate_domain::UserId;
use tokio::sync::Mutex;

use super::{EmailService, PasswordResetService, PasswordResetTokenRepository};
use crate::{ManualClock, NewUserRecord, PasswordHasher, UserRecord, UserRepository};

struct SingleUserRepository {
    user: Mutex<UserRecord>,
}

#[async_trait]
impl UserRepository for SingleUserRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let user = self.user.lock().await;
        Ok((user.email == email).then(|| user.clone()))
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let user = self.user.lock().await;
        Ok((user.id == user_id).then(|| user.clone()))
    }

    async fn create(&self, _user: NewUserRecord) -> AppResult<UserRecord> {
        Err(AppError::Internal("not supported in this fake".to_owned()))
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        let mut user = self.user.lock().await;
        if user.id != user_id {
            return Err(AppError::NotFound(format!("user '{user_id}'")));
        }
        user.password_hash = password_hash.to_owned();
        Ok(())
    }
}

#[derive(Default)]
struct FakeTokenRepository {
    tokens: Mutex<HashMap<String, (UserId, DateTime<Utc>)>>,
}

#[async_trait]
impl PasswordResetTokenRepository for FakeTokenRepository {
    async fn create_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.tokens
            .lock()
            .await
            .insert(token_hash.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn consume_valid_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<UserId>> {
        Ok(self
            .tokens
            .lock()
            .await
            .remove(token_hash)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(user_id, _)| user_id))
    }

    async fn invalidate_tokens_for_user(&self, user_id: UserId) -> AppResult<()> {
        self.tokens
            .lock()
            .await
            .retain(|_, (owner, _)| *owner != user_id);
        Ok(())
    }
}

#[derive(Default)]
struct CapturingEmailService {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl EmailService for CapturingEmailService {
    async fn send_email(&self, to: &str, _subject: &str, text_body: &str) -> AppResult<()> {
        self.sent
            .lock()
            .await
            .push((to.to_owned(), text_body.to_owned()));
        Ok(())
    }
}

struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("plain:{password}"))
    }
}

struct Harness {
    service: PasswordResetService,
    users: Arc<SingleUserRepository>,
    email: Arc<CapturingEmailService>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let users = Arc::new(SingleUserRepository {
        user: Mutex::new(UserRecord {
            id: UserId::new(),
            email: "seeker@acme.io".to_owned(),
            display_name: "Seeker".to_owned(),
            role: UserRole::JobSeeker,
            password_hash: "plain:old password value".to_owned(),
        }),
    });
    let email = Arc::new(CapturingEmailService::default());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = PasswordResetService::new(
        users.clone(),
        Arc::new(FakeTokenRepository::default()),
        email.clone(),
        Arc::new(PlainHasher),
        clock.clone(),
        "http://localhost:5173/".to_owned(),
    );

    Harness {
        service,
        users,
        email,
        clock,
    }
}

async fn sent_token(email: &CapturingEmailService) -> Option<String> {
    let sent = email.sent.lock().await;
    let (_, body) = sent.last()?;
    let (_, after) = body.split_once("token=")?;
    after.split_whitespace().next().map(ToOwned::to_owned)
}

#[tokio::test]
async fn request_emails_link_and_token_resets_password_once() -> AppResult<()> {
    let harness = harness();

    harness
        .service
        .request_password_reset("Seeker@Acme.io")
        .await?;

    let token = sent_token(&harness.email)
        .await
        .ok_or_else(|| AppError::Internal("no reset email captured".to_owned()))?;
    {
        let sent = harness.email.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("http://localhost:5173/reset-password?token="));
    }

    harness
        .service
        .reset_password(&token, "brand new passphrase")
        .await?;
    assert_eq!(
        harness.users.user.lock().await.password_hash,
        "plain:brand new passphrase"
    );

    let reused = harness
        .service
        .reset_password(&token, "another new passphrase")
        .await;
    assert!(matches!(reused, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn unknown_and_malformed_emails_succeed_silently() -> AppResult<()> {
    let harness = harness();

    harness
        .service
        .request_password_reset("nobody@acme.io")
        .await?;
    harness.service.request_password_reset("nonsense").await?;

    assert!(harness.email.sent.lock().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn expired_and_superseded_tokens_are_rejected() -> AppResult<()> {
    let harness = harness();

    harness.service.request_password_reset("seeker@acme.io").await?;
    let first = sent_token(&harness.email).await.unwrap_or_default();
    harness.service.request_password_reset("seeker@acme.io").await?;
    let second = sent_token(&harness.email).await.unwrap_or_default();

    let superseded = harness
        .service
        .reset_password(&first, "brand new passphrase")
        .await;
    assert!(matches!(superseded, Err(AppError::Unauthorized(_))));

    harness.clock.advance(TimeDelta::minutes(61));
    let expired = harness
        .service
        .reset_password(&second, "brand new passphrase")
        .await;
    assert!(matches!(expired, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn weak_new_password_is_rejected_before_token_is_consumed() -> AppResult<()> {
    let harness = harness();

    harness.service.request_password_reset("seeker@acme.io").await?;
    let token = sent_token(&harness.email).await.unwrap_or_default();

    let weak = harness.service.reset_password(&token, "short").await;
    assert!(matches!(weak, Err(AppError::Validation(_))));

    harness
        .service
        .reset_password(&token, "brand new passphrase")
        .await?;
    Ok(())
}
