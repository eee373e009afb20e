//! Password hashing and verification utilities
//!
//! Uses Argon2id for password hashing. Hashes are PHC strings carrying their
//! own salt, so re-hashing a candidate with the stored salt is exactly what
//! `verify_password` does.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use auth_core::{DomainError, DomainResult};
use rand::{distributions::Alphanumeric, Rng};

/// Length of generated passwords for accounts created without one
const RANDOM_PASSWORD_LENGTH: usize = 24;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> DomainResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::InternalError(format!("Password hashing failed: {e}")))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> DomainResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| DomainError::InternalError(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Random alphanumeric string of `len` characters
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random password for accounts created without one
pub fn random_password() -> String {
    random_token(RANDOM_PASSWORD_LENGTH)
}

/// Password service for dependency injection
#[derive(Debug, Clone, Default)]
pub struct PasswordService;

impl PasswordService {
    /// Create a new password service
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> DomainResult<String> {
        hash_password(password)
    }

    /// Hash a freshly generated random password
    pub fn hash_random(&self) -> DomainResult<String> {
        hash_password(&random_password())
    }

    /// Verify a password against a hash
    pub fn verify(&self, password: &str, hash: &str) -> DomainResult<bool> {
        verify_password(password, hash)
    }

    /// Whether a stored value is a well-formed password hash
    pub fn is_hash(&self, value: &str) -> bool {
        PasswordHash::new(value).is_ok()
    }
}
