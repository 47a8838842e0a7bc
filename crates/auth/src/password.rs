//! Password hashing via bcrypt.

use thiserror::Error;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hash a password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with_cost(password, BCRYPT_COST)
}

/// Hash a password at an explicit cost (deployments tune this).
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash(password, cost).map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verify a password against a stored bcrypt hash.
///
/// Comparison happens inside bcrypt against the recomputed digest; the
/// plaintext is never compared to anything decrypted.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    bcrypt::verify(password, hash).map_err(|e| PasswordError::Hash(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        // Cost 4 keeps the test fast; production uses BCRYPT_COST.
        let hash = hash_password_with_cost("hunter22", 4).unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password_with_cost("hunter22", 4).unwrap();
        let b = hash_password_with_cost("hunter22", 4).unwrap();
        assert_ne!(a, b);
    }
}
