use std::fmt;
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand_core::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("password does not match")]
    Mismatch,
}

/// Opaque password hashing capability.
pub trait HashProvider: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError>;

    /// Returns false for a wrong password and for an unreadable digest alike.
    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

/// Argon2id with a random salt, stored as a PHC string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl HashProvider for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Checks plaintext passwords against stored digests. The plaintext is never
/// logged or kept.
#[derive(Clone)]
pub struct CredentialVerifier {
    provider: Arc<dyn HashProvider>,
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    pub fn new(provider: Arc<dyn HashProvider>) -> Self {
        Self { provider }
    }

    pub fn digest(&self, plaintext: &str) -> Result<String, PasswordError> {
        self.provider.hash(plaintext)
    }

    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<(), PasswordError> {
        if self.provider.verify(plaintext, digest) {
            Ok(())
        } else {
            Err(PasswordError::Mismatch)
        }
    }
}
