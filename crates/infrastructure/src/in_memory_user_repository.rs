use std::collections::HashMap;

use async_trait::async_trait;
use jobgate_application::{NewUserRecord, UserRecord, UserRepository};
use jobgate_core::{AppError, AppResult};
use jobgate_domain::UserId;
use tokio::sync::RwLock;

/// Process-local account storage keyed by user id.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn create(&self, user: NewUserRecord) -> AppResult<UserRecord> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(AppError::Conflict(format!(
                "an account for '{}' already exists",
                user.email
            )));
        }

        let record = UserRecord {
            id: UserId::new(),
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            password_hash: user.password_hash,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))?;
        user.password_hash = password_hash.to_owned();
        Ok(())
    }
}
