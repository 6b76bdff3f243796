//! Password hashing and verification for protected downloads.
//!
//! Uses Argon2id. Stored hashes are PHC strings carrying their own salt and
//! parameters, so the cost can be changed without invalidating old uploads.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;

use crate::{FilehostError, Result};

/// Argon2id hasher with a fixed, tunable cost.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    /// The argon2 crate's recommended cost: 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with explicit parameters.
    ///
    /// * `m_cost` - memory in KiB
    /// * `t_cost` - iterations
    /// * `p_cost` - parallelism
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| FilehostError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// # Examples
    ///
    /// ```
    /// use filehost::file::PasswordHasher;
    ///
    /// let hasher = PasswordHasher::with_params(256, 1, 1).unwrap();
    /// let hash = hasher.hash("p").unwrap();
    /// assert!(hash.starts_with("$argon2id$"));
    /// ```
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| FilehostError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch. Only a stored hash that cannot be
    /// parsed at all is an error.
    pub fn verify(&self, plaintext: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| FilehostError::Hashing(format!("corrupt password hash: {e}")))?;

        // Parameters come from the stored hash, not from self.params.
        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok())
    }
}
