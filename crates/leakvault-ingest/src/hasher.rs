//! One-way password hashing
//!
//! Every plaintext is hashed with Argon2id, a fresh random salt and the work
//! factor from [`HashConfig`]. Output is a PHC string
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so the parameters travel
//! with each record and can be raised later without breaking verification.
//!
//! A failure here is fatal for the run: callers must not fall back to storing
//! the plaintext or skipping the hash.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, Salt, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::{rngs::OsRng, TryRngCore};

use crate::config::HashConfig;
use crate::error::{IngestError, Result};

/// Hashing seam used by the insert workers
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password. The empty string is valid input.
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Check a plaintext against a stored hash
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool>;
}

/// Argon2id implementation of [`CredentialHasher`]
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    const SALT_LENGTH: usize = Salt::RECOMMENDED_LENGTH;

    pub fn new(config: &HashConfig) -> Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| IngestError::Configuration(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|e| IngestError::Hash(format!("OS random source unavailable: {}", e)))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| IngestError::Hash(e.to_string()))?;

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| IngestError::Hash(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| IngestError::Hash(format!("Malformed password hash: {}", e)))?;
        Ok(self
            .argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok())
    }
}
