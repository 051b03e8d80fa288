//! Argon2id password hashing
//!
//! Hashes are PHC strings carrying their own salt and parameters, so a
//! hasher configured with different costs can still verify older records.

use crate::{AccountError, Result};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Plaintext hashed once at construction and verified against whenever the
/// looked-up account does not exist.
const DUMMY_PASSWORD: &str = "accountd-dummy-password";

/// One-way, salted password hasher
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Create a hasher with the argon2 crate's recommended Argon2id costs
    pub fn new() -> Result<Self> {
        Self::from_argon2(Argon2::default())
    }

    /// Create a hasher with explicit costs (memory in KiB, iterations, lanes)
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AccountError::Internal(format!("invalid argon2 params: {}", e)))?;
        Self::from_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Result<Self> {
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;
        Ok(PasswordHasher { argon2, dummy_hash })
    }

    /// Hash a plaintext password into a PHC string
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        hash_with(&self.argon2, plaintext)
    }

    /// Verify a plaintext password against a stored PHC string.
    ///
    /// The digest comparison inside argon2 is constant-time. A stored hash
    /// that cannot be parsed never verifies.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self.argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    /// Burn one verification so a lookup miss costs as much as a mismatch
    pub fn verify_dummy(&self, plaintext: &str) {
        let _ = self.verify(plaintext, &self.dummy_hash);
    }
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", self.argon2.params())
            .finish_non_exhaustive()
    }
}

fn hash_with(argon2: &Argon2<'_>, plaintext: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AccountError::Internal(format!("salt encoding failed: {}", e)))?;

    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| AccountError::Internal(format!("password hashing failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(8, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret1", &hash));
        assert!(!hasher.verify("secret2", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = hasher();
        let first = hasher.hash("same-password").unwrap();
        let second = hasher.hash("same-password").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("same-password", &first));
        assert!(hasher.verify("same-password", &second));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = hasher();
        assert!(!hasher.verify("secret1", ""));
        assert!(!hasher.verify("secret1", "not-a-phc-string"));
        assert!(!hasher.verify("secret1", "secret1"));
    }

    #[test]
    fn test_verifies_hash_from_other_params() {
        let cheap = hasher();
        let other = PasswordHasher::with_params(16, 2, 1).unwrap();
        let hash = other.hash("portable").unwrap();

        assert!(cheap.verify("portable", &hash));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(
            PasswordHasher::with_params(0, 0, 0),
            Err(AccountError::Internal(_))
        ));
    }
}
