use jobgate_core::AppError;
use jobgate_domain::{EmailAddress, validate_password};

use super::*;

impl UserService {
    /// Registers a new account with email and password.
    ///
    /// Emails configured as admin emails receive the admin role; everyone
    /// else gets the role they asked for, which may not be admin.
    pub async fn register(&self, params: RegisterParams) -> AppResult<UserRecord> {
        if params.role == UserRole::Admin {
            return Err(AppError::Forbidden(
                "the admin role cannot be requested at registration".to_owned(),
            ));
        }

        let email_address = EmailAddress::new(&params.email)?;
        validate_password(&params.password)?;

        let existing = self
            .user_repository
            .find_by_email(email_address.as_str())
            .await?;
        if existing.is_some() {
            // Keep timing close to the success path.
            let _ = self.password_hasher.hash_password(&params.password);
            return Err(AppError::Conflict(
                "an account with this email already exists".to_owned(),
            ));
        }

        let display_name = params
            .display_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email_address.local_part().to_owned());

        let role = if self.admin_emails.contains(email_address.as_str()) {
            UserRole::Admin
        } else {
            params.role
        };

        let password_hash = self.password_hasher.hash_password(&params.password)?;

        self.user_repository
            .create(NewUserRecord {
                email: email_address.into(),
                display_name,
                role,
                password_hash,
            })
            .await
    }
}
