use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// Portal role attached to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Browses postings and applies to jobs.
    JobSeeker,
    /// Manages job listings and applicant pipelines.
    Recruiter,
    /// Moderates the platform.
    Admin,
}

impl UserRole {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobSeeker => "job_seeker",
            Self::Recruiter => "recruiter",
            Self::Admin => "admin",
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "job_seeker" => Ok(Self::JobSeeker),
            "recruiter" => Ok(Self::Recruiter),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!("unknown user role '{value}'"))),
        }
    }
}

/// User information persisted in the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    display_name: String,
    email: String,
    role: UserRole,
}

impl UserIdentity {
    /// Creates a user identity from account data.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            subject: subject.into(),
            display_name: display_name.into(),
            email: email.into(),
            role,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the display name for the current user.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the account email.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the portal role.
    #[must_use]
    pub fn role(&self) -> UserRole {
        self.role
    }

    /// Returns whether the identity may perform admin actions.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{UserIdentity, UserRole};

    #[test]
    fn role_round_trips_through_storage_value() {
        for role in [UserRole::JobSeeker, UserRole::Recruiter, UserRole::Admin] {
            assert_eq!(UserRole::from_str(role.as_str()).ok(), Some(role));
        }
        assert!(UserRole::from_str("superuser").is_err());
    }

    #[test]
    fn identity_serializes_role_in_snake_case() {
        let identity = UserIdentity::new("u-1", "Ada", "ada@example.com", UserRole::JobSeeker);
        let encoded = serde_json::to_value(&identity).unwrap_or_default();

        assert_eq!(encoded["role"], "job_seeker");
        assert!(!identity.is_admin());
    }
}
