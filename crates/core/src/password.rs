//! Argon2id password hashing.
//!
//! Hashes are stored in PHC string format with a random salt per password.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{ClinicError, ClinicResult};

/// Hash a password for storage.
///
/// # Errors
///
/// Returns [`ClinicError::PasswordHash`] if hashing fails.
pub fn hash_password(password: &str) -> ClinicResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ClinicError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored PHC hash.
///
/// A malformed stored hash verifies as `false` rather than erroring, so a corrupt record
/// cannot be told apart from a wrong password by the caller.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            tracing::warn!(error = %err, "stored password hash is malformed");
            false
        }
    }
}
