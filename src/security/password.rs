use super::error::AuthError;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use std::sync::OnceLock;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Outcome of checking a password against a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Valid,
    /// Matched a plaintext value left by an older store; should be rehashed
    ValidLegacy,
    Invalid,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Verification::Invalid)
    }
}

/// Argon2id PHC string for `password`. CPU-bound; call from blocking contexts only.
pub fn hash_password_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check `password` against a stored PHC string, or against a plaintext value
/// when the stored value is not a PHC string. Both comparisons are constant-time.
pub fn verify_password_blocking(password: &str, stored: &str) -> Verification {
    match PasswordHash::new(stored) {
        Ok(parsed) => {
            if Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
            {
                Verification::Valid
            } else {
                Verification::Invalid
            }
        }
        Err(_) if !stored.is_empty() && bool::from(password.as_bytes().ct_eq(stored.as_bytes())) => {
            Verification::ValidLegacy
        }
        Err(_) => Verification::Invalid,
    }
}

/// Hash on the blocking thread pool
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| AuthError::Hashing(format!("Task join error: {}", e)))?
}

/// Verify on the blocking thread pool
pub async fn verify_password(password: &str, stored: &str) -> Result<Verification, AuthError> {
    let password = password.to_string();
    let stored = stored.to_string();
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &stored))
        .await
        .map_err(|e| AuthError::Hashing(format!("Task join error: {}", e)))
}

/// A real argon2 hash of a random secret, checked in place of a missing
/// account's hash so unknown usernames cost as much as wrong passwords.
pub fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| {
        let secret = SaltString::generate(&mut OsRng);
        hash_password_blocking(secret.as_str()).unwrap_or_else(|e| {
            warn!("Could not prepare dummy password hash: {}", e);
            String::new()
        })
    })
}
