use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Hashes a plain-text password with Argon2 and a fresh salt
pub fn hash(plain: &str) -> Result<String, PasswordError> {
    if plain.len() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verifies a plain-text password against a stored hash
pub fn verify(plain: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hashed = hash("correct horse battery").unwrap();

        assert_ne!(hashed, "correct horse battery");
        assert!(verify("correct horse battery", &hashed));
        assert!(!verify("wrong password", &hashed));
    }

    #[test]
    fn same_password_different_salts() {
        let first = hash("same password").unwrap();
        let second = hash("same password").unwrap();

        assert_ne!(first, second);
        assert!(verify("same password", &first));
        assert!(verify("same password", &second));
    }

    #[test]
    fn rejects_short_password() {
        assert!(matches!(hash("short"), Err(PasswordError::TooShort)));
    }

    #[test]
    fn rejects_malformed_stored_hash() {
        assert!(!verify("anything", "not-an-argon2-hash"));
    }
}
