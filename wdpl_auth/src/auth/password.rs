//! Credential hasher: Argon2id with a fresh random salt per hash.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::{Arc, OnceLock};

use super::errors::{AuthError, AuthResult};

// Verified against when the login email is unknown, so both rejection paths
// pay the same hashing cost.
const DUMMY_PASSWORD: &str = "wdpl-dummy-password";

/// One-way password transform and its verification predicate
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    dummy_hash: Arc<OnceLock<Option<String>>>,
}

impl CredentialHasher {
    /// Create a hasher producing Argon2id (v0x13) hashes with the given cost
    pub fn new(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Hash a plaintext password into a PHC string
    ///
    /// # Errors
    ///
    /// * `AuthError::HashingFailed` - Argon2 rejected the input or parameters
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Check a plaintext password against a stored hash
    ///
    /// A mismatch, or a stored value that is not a valid PHC string, is `false`.
    /// The cost parameters embedded in the stored hash are the ones used.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Burn one verification's worth of work without a real hash
    pub fn verify_dummy(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hash(DUMMY_PASSWORD).ok());

        if let Some(hash) = dummy {
            let _ = self.verify(password, hash);
        }
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}
