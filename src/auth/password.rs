use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use std::sync::OnceLock;
use tracing::warn;

use crate::Result;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// Argon2 compares the derived digests in constant time. A stored hash that
/// cannot be parsed counts as a mismatch.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

/// Burn the same work as a real verification when no account matched, so
/// response timing does not reveal which emails are registered.
pub fn verify_against_dummy(password: &str) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY_HASH.get_or_init(|| hash_password("dummy-password-for-timing").ok());
    if let Some(hash) = dummy {
        let _ = verify_password(hash, password);
    }
}

/// Strength problems with a candidate password, empty when it is acceptable.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        problems.push("Password must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        problems.push("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain a digit");
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Bingo2024").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "Bingo2024"));
        assert!(!verify_password(&hash, "bingo2024"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("Bingo2024").unwrap();
        let b = hash_password("Bingo2024").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unparseable_hash_never_matches() {
        assert!(!verify_password("plaintext", "plaintext"));
    }

    #[test]
    fn test_lowercase_only_password_is_weak() {
        let problems = password_problems("abcdefgh");
        assert!(problems.contains(&"Password must contain an uppercase letter"));
        assert!(problems.contains(&"Password must contain a digit"));
        assert!(!problems.contains(&"Password must be at least 8 characters"));
    }

    #[test]
    fn test_strong_password_has_no_problems() {
        assert!(password_problems("Abcdefg1").is_empty());
        assert_eq!(password_problems("Abc1"), vec!["Password must be at least 8 characters"]);
    }
}
