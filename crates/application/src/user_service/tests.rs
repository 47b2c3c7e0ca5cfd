use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jobgate_core::{AppError, AppResult, UserRole};
use jobgate_domain::UserId;
use tokio::sync::Mutex;

use super::{
    AuthOutcome, NewUserRecord, PasswordHasher, RegisterParams, UserRecord, UserRepository,
    UserService,
};

#[derive(Default)]
struct FakeUserRepository {
    users: Mutex<HashMap<String, UserRecord>>,
}

#[async_trait]
impl UserRepository for FakeUserRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.users.lock().await.get(email).cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.id == user_id)
            .cloned())
    }

    async fn create(&self, user: NewUserRecord) -> AppResult<UserRecord> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.email) {
            return Err(AppError::Conflict("duplicate".to_owned()));
        }

        let record = UserRecord {
            id: UserId::new(),
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            password_hash: user.password_hash,
        };
        users.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    async fn update_password(&self, user_id: UserId, password_hash: &str) -> AppResult<()> {
        let mut users = self.users.lock().await;
        let user = users
            .values_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}'")))?;
        user.password_hash = password_hash.to_owned();
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

fn build_service() -> UserService {
    UserService::new(
        Arc::new(FakeUserRepository::default()),
        Arc::new(PlainHasher),
    )
    .with_admin_emails(["Moderator@Jobs.Example ".to_owned()])
}

fn params(email: &str, role: UserRole) -> RegisterParams {
    RegisterParams {
        email: email.to_owned(),
        password: "correct horse battery".to_owned(),
        display_name: None,
        role,
    }
}

#[tokio::test]
async fn register_defaults_display_name_and_keeps_requested_role() -> AppResult<()> {
    let service = build_service();

    let user = service
        .register(params("Recruiter@Acme.io", UserRole::Recruiter))
        .await?;

    assert_eq!(user.email, "recruiter@acme.io");
    assert_eq!(user.display_name, "recruiter");
    assert_eq!(user.role, UserRole::Recruiter);
    Ok(())
}

#[tokio::test]
async fn register_promotes_configured_admin_emails() -> AppResult<()> {
    let service = build_service();

    let user = service
        .register(params("moderator@jobs.example", UserRole::JobSeeker))
        .await?;

    assert_eq!(user.role, UserRole::Admin);
    assert!(user.identity().is_admin());
    Ok(())
}

#[tokio::test]
async fn register_rejects_admin_role_requests_and_duplicates() {
    let service = build_service();

    let admin_request = service
        .register(params("someone@acme.io", UserRole::Admin))
        .await;
    assert!(matches!(admin_request, Err(AppError::Forbidden(_))));

    let first = service
        .register(params("dup@acme.io", UserRole::JobSeeker))
        .await;
    assert!(first.is_ok());

    let second = service
        .register(params("DUP@acme.io", UserRole::JobSeeker))
        .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn register_validates_password_strength() {
    let service = build_service();
    let mut weak = params("weak@acme.io", UserRole::JobSeeker);
    weak.password = "short".to_owned();

    let result = service.register(weak).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn login_fails_generically_for_unknown_email_and_wrong_password() -> AppResult<()> {
    let service = build_service();
    service
        .register(params("seeker@acme.io", UserRole::JobSeeker))
        .await?;

    let unknown = service.login("nobody@acme.io", "correct horse battery").await?;
    assert!(matches!(unknown, AuthOutcome::Failed));

    let wrong = service.login("seeker@acme.io", "not the password").await?;
    assert!(matches!(wrong, AuthOutcome::Failed));

    let malformed = service.login("not-an-email", "whatever").await?;
    assert!(matches!(malformed, AuthOutcome::Failed));

    let success = service
        .login(" Seeker@Acme.io", "correct horse battery")
        .await?;
    let AuthOutcome::Authenticated(user) = success else {
        panic!("valid credentials should authenticate");
    };
    assert_eq!(user.email, "seeker@acme.io");
    Ok(())
}
