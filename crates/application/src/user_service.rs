//! User account ports and application service.
//!
//! Owns registration and password authentication. Failures are reported
//! generically so responses do not reveal which accounts exist.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use jobgate_core::{AppResult, UserIdentity, UserRole};
use jobgate_domain::UserId;

mod login;
mod registration;

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// User record returned by repository queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Canonical email address.
    pub email: String,
    /// Name shown in the portal.
    pub display_name: String,
    /// Portal role.
    pub role: UserRole,
    /// Argon2id password hash.
    pub password_hash: String,
}

impl UserRecord {
    /// Builds the identity stored in the session after login.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(
            self.id.to_string(),
            self.display_name.clone(),
            self.email.clone(),
            self.role,
        )
    }
}

/// Fields required to create a user record.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    /// Canonical email address.
    pub email: String,
    /// Name shown in the portal.
    pub display_name: String,
    /// Portal role.
    pub role: UserRole,
    /// Argon2id password hash.
    pub password_hash: String,
}

/// Repository port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by canonical email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    /// Finds a user by identifier.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Creates a user. Fails with `AppError::Conflict` when the email is taken.
    async fn create(&self, user: NewUserRecord) -> AppResult<UserRecord>;

    /// Replaces the password hash for a user.
    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()>;
}

/// Port for password hashing. Keeps application code free of direct
/// cryptographic library coupling.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// Result of a login attempt.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Credentials matched.
    Authenticated(UserRecord),
    /// Unknown email or wrong password.
    Failed,
}

/// Parameters for user registration.
#[derive(Debug, Clone)]
pub struct RegisterParams {
    /// Email address for the new account.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Optional display name; defaults to the email local part.
    pub display_name: Option<String>,
    /// Requested role. Admin cannot be requested.
    pub role: UserRole,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for account registration and login.
#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    admin_emails: Arc<HashSet<String>>,
}

impl UserService {
    /// Creates a new user service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            admin_emails: Arc::new(HashSet::new()),
        }
    }

    /// Registers accounts for these emails with the admin role.
    #[must_use]
    pub fn with_admin_emails(mut self, emails: impl IntoIterator<Item = String>) -> Self {
        self.admin_emails = Arc::new(
            emails
                .into_iter()
                .map(|email| email.trim().to_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        );
        self
    }
}
