use jobgate_domain::EmailAddress;

use super::*;

impl UserService {
    /// Authenticates a user with email and password.
    ///
    /// Every failure is `AuthOutcome::Failed` so callers cannot tell an
    /// unknown email from a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthOutcome> {
        let Ok(email_address) = EmailAddress::new(email) else {
            let _ = self.password_hasher.hash_password(password);
            return Ok(AuthOutcome::Failed);
        };

        let Some(user) = self
            .user_repository
            .find_by_email(email_address.as_str())
            .await?
        else {
            // Hash anyway so unknown accounts take as long as known ones.
            let _ = self.password_hasher.hash_password(password);
            return Ok(AuthOutcome::Failed);
        };

        if !self
            .password_hasher
            .verify_password(password, &user.password_hash)?
        {
            return Ok(AuthOutcome::Failed);
        }

        Ok(AuthOutcome::Authenticated(user))
    }
}
