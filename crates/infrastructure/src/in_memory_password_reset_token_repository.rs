use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobgate_application::PasswordResetTokenRepository;
use jobgate_core::AppResult;
use jobgate_domain::UserId;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct StoredToken {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// Process-local reset token storage keyed by token hash.
#[derive(Default)]
pub struct InMemoryPasswordResetTokenRepository {
    tokens: Mutex<HashMap<String, StoredToken>>,
}

impl InMemoryPasswordResetTokenRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasswordResetTokenRepository for InMemoryPasswordResetTokenRepository {
    async fn create_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.tokens.lock().await.insert(
            token_hash.to_owned(),
            StoredToken {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn consume_valid_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<UserId>> {
        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, token| now < token.expires_at);

        Ok(tokens.remove(token_hash).map(|token| token.user_id))
    }

    async fn invalidate_tokens_for_user(&self, user_id: UserId) -> AppResult<()> {
        self.tokens
            .lock()
            .await
            .retain(|_, token| token.user_id != user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use jobgate_application::PasswordResetTokenRepository;
    use jobgate_core::AppResult;
    use jobgate_domain::UserId;

    use super::InMemoryPasswordResetTokenRepository;

    #[tokio::test]
    async fn tokens_are_single_use_and_expire() -> AppResult<()> {
        let repository = InMemoryPasswordResetTokenRepository::new();
        let user_id = UserId::new();
        let now = Utc::now();

        repository
            .create_token(user_id, "fresh", now + TimeDelta::hours(1))
            .await?;
        repository
            .create_token(user_id, "stale", now + TimeDelta::minutes(1))
            .await?;

        assert_eq!(repository.consume_valid_token("fresh", now).await?, Some(user_id));
        assert_eq!(repository.consume_valid_token("fresh", now).await?, None);

        let later = now + TimeDelta::minutes(2);
        assert_eq!(repository.consume_valid_token("stale", later).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn invalidation_only_touches_one_user() -> AppResult<()> {
        let repository = InMemoryPasswordResetTokenRepository::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let expires_at = Utc::now() + TimeDelta::hours(1);

        repository.create_token(alice, "a", expires_at).await?;
        repository.create_token(bob, "b", expires_at).await?;
        repository.invalidate_tokens_for_user(alice).await?;

        let now = Utc::now();
        assert_eq!(repository.consume_valid_token("a", now).await?, None);
        assert_eq!(repository.consume_valid_token("b", now).await?, Some(bob));
        Ok(())
    }
}
