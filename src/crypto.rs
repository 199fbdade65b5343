use argon2::{Algorithm, Argon2, Params, PasswordVerifier, Version};
use password_hash::{PasswordHash, PasswordHasher as _, SaltString};
use rand::Rng;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::AccessError;

/// Length of generated bearer tokens, in characters.
pub const BEARER_TOKEN_LENGTH: usize = 40;

/// Password digest producer used by signup.
///
/// ```rust
/// use teamgate::crypto::{Argon2Hasher, PasswordHasher};
///
/// let hasher = Argon2Hasher::new(4096, 1, 1);
/// let digest = hasher.hash("correct horse").unwrap();
/// assert!(hasher.verify("correct horse", &digest).unwrap());
/// assert!(!hasher.verify("battery staple", &digest).unwrap());
/// ```
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    ///
    /// Returns `AccessError::PasswordHash` if hashing fails.
    fn hash(&self, password: &str) -> Result<String, AccessError>;

    /// # Errors
    ///
    /// Returns `AccessError::PasswordHash` if `digest` is malformed.
    fn verify(&self, password: &str, digest: &str) -> Result<bool, AccessError>;
}

/// Argon2id hasher.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    /// Memory cost in KiB
    memory_cost: u32,
    /// Number of iterations
    time_cost: u32,
    /// Degree of parallelism
    parallelism: u32,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Hasher {
    #[must_use]
    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// 64 MiB memory, 3 iterations, 4 lanes.
    #[must_use]
    pub fn production() -> Self {
        Self::new(65536, 3, 4)
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, AccessError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|_| AccessError::PasswordHash)?;

        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password(password.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|_| AccessError::PasswordHash)
    }

    fn verify(&self, password: &str, digest: &str) -> Result<bool, AccessError> {
        let parsed = PasswordHash::new(digest).map_err(|_| AccessError::PasswordHash)?;

        // params come from the digest itself
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Generates an alphanumeric bearer token of `length` characters.
pub fn generate_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(rng.sample(rand::distributions::Alphanumeric)))
        .collect()
}

/// SHA-256 hex digest of a bearer token, the form tokens are stored in.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
