//! Password hashing
//!
//! Argon2id with the argon2 crate's default parameters and a random salt
//! per hash. Hashes are stored as PHC strings.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

/// Hash a password, returning the PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch and an error only for malformed hashes.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {}", e)),
    }
}

static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("keel-dummy-password").ok());

/// Spend the same time as a real verification when the account is unknown
pub fn verify_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id() {
        let hash = hash_password("s3cret-pass").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("s3cret-pass"));
    }

    #[test]
    fn test_same_password_different_salts() {
        let a = hash_password("same_password").unwrap();
        let b = hash_password("same_password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_round_trip() {
        let hash = hash_password("correct horse 1").unwrap();
        assert!(verify_password("correct horse 1", &hash).unwrap());
        assert!(!verify_password("wrong horse 1", &hash).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash_errors() {
        assert!(verify_password("password", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_unicode_password() {
        let hash = hash_password("пароль🔐9").unwrap();
        assert!(verify_password("пароль🔐9", &hash).unwrap());
    }
}
