//! Argon2id password hashing for portal accounts.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use jobgate_application::PasswordHasher as PasswordHasherPort;
use jobgate_core::{AppError, AppResult};

/// Argon2id hasher. Defaults to m=19456 KiB, t=2, p=1.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// Creates a hasher with the default cost parameters.
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(19_456, 2, 1, None).unwrap_or_else(|_| Params::default());
        Self::from_params(params)
    }

    /// Creates a hasher with explicit memory (KiB), iteration and lane costs.
    pub fn with_params(memory_kib: u32, iterations: u32, lanes: u32) -> AppResult<Self> {
        let params = Params::new(memory_kib, iterations, lanes, None).map_err(|error| {
            AppError::Validation(format!("invalid argon2 parameters: {error}"))
        })?;
        Ok(Self::from_params(params))
    }

    fn from_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasherPort for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|error| {
            AppError::Internal(format!("stored password hash is malformed: {error}"))
        })?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "password verification failed: {error}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use jobgate_application::PasswordHasher as PasswordHasherPort;
    use jobgate_core::{AppError, AppResult};

    use super::Argon2PasswordHasher;

    fn cheap_hasher() -> AppResult<Argon2PasswordHasher> {
        Argon2PasswordHasher::with_params(1024, 1, 1)
    }

    #[test]
    fn verifies_the_hashed_password_only() -> AppResult<()> {
        let hasher = cheap_hasher()?;
        let hash = hasher.hash_password("correct horse battery")?;

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("correct horse battery", &hash)?);
        assert!(!hasher.verify_password("correct horse battery!", &hash)?);
        Ok(())
    }

    #[test]
    fn salts_each_hash() -> AppResult<()> {
        let hasher = cheap_hasher()?;
        assert_ne!(
            hasher.hash_password("same password")?,
            hasher.hash_password("same password")?
        );
        Ok(())
    }

    #[test]
    fn malformed_hash_is_an_internal_error() -> AppResult<()> {
        let hasher = cheap_hasher()?;
        let result = hasher.verify_password("anything", "not-a-phc-string");
        assert!(matches!(result, Err(AppError::Internal(_))));
        Ok(())
    }

    #[test]
    fn zero_iterations_are_rejected() {
        assert!(matches!(
            Argon2PasswordHasher::with_params(1024, 0, 1),
            Err(AppError::Validation(_))
        ));
    }
}
