//! User domain types and validation rules.

use jobgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated, lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Structural checks only: exactly one `@`, non-empty local part, and a
    /// domain containing at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let trimmed = value.into().trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        };

        if domain.contains('@') {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        }

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the part before `@`, used as a fallback display name.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or(self.0.as_str())
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Minimum password length (NIST SP800-63B, no second factor).
pub const PASSWORD_MIN_LENGTH: usize = 10;

/// Maximum password length; bounds Argon2 work per request.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Validates a plaintext password for a new or reset account.
pub fn validate_password(password: &str) -> AppResult<()> {
    let char_count = password.chars().count();

    if char_count < PASSWORD_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }

    if char_count > PASSWORD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "password must not exceed {PASSWORD_MAX_LENGTH} characters"
        )));
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.iter().any(|entry| *entry == lowered) {
        return Err(AppError::Validation(
            "this password is too common and has appeared in data breaches".to_owned(),
        ));
    }

    Ok(())
}

// Long-enough entries from public breach top lists.
static COMMON_PASSWORDS: &[&str] = &[
    "1234567890",
    "qwertyuiop",
    "password12",
    "password123",
    "iloveyou12",
    "1q2w3e4r5t",
    "0987654321",
    "qwerty1234",
    "1qaz2wsx3edc",
    "letmein123",
    "welcome123",
    "passw0rd123",
];

#[cfg(test)]
mod tests {
    use super::{EmailAddress, validate_password};

    #[test]
    fn email_is_trimmed_and_lower_cased() {
        let email = EmailAddress::new("  Ada@Example.COM ");
        assert_eq!(
            email.ok().map(String::from),
            Some("ada@example.com".to_owned())
        );
    }

    #[test]
    fn email_requires_single_at_and_dotted_domain() {
        assert!(EmailAddress::new("ada@@example.com").is_err());
        assert!(EmailAddress::new("ada@localhost").is_err());
        assert!(EmailAddress::new("@example.com").is_err());
    }

    #[test]
    fn local_part_is_used_for_display_fallback() {
        let email = EmailAddress::new("grace.hopper@navy.mil");
        assert_eq!(email.ok().as_ref().map(EmailAddress::local_part), Some("grace.hopper"));
    }

    #[test]
    fn password_rules_reject_short_and_common_values() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("Password123").is_err());
        assert!(validate_password("correct horse battery").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }
}
