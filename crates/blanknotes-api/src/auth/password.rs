//! Password hashing and verification using Argon2id
//!
//! Defaults follow the OWASP recommendation:
//! - Algorithm: Argon2id
//! - Memory: 64 MB
//! - Iterations: 3
//! - Parallelism: 4 threads
//! - Salt: 16 bytes random
//! - Output: 32 bytes hash

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use thiserror::Error;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// One-way credential hashing
pub trait CredentialHasher: Send + Sync {
    /// Hash `plaintext` with a fresh random salt
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError>;

    /// Check `plaintext` against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; a stored hash that cannot be parsed is an
    /// error.
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, PasswordError>;
}

/// Password hashing configuration
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Cheapest parameters Argon2 accepts; for test suites only
    pub fn minimal() -> Self {
        Self {
            memory_cost: Params::MIN_M_COST,
            time_cost: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a password with custom configuration
///
/// Returns a PHC string (`$argon2id$v=19$m=...`) that embeds the salt and
/// parameters, so it is the only thing that needs storing.
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored hash
///
/// Parameters are read back from the PHC string, so hashes produced with
/// any [`PasswordConfig`] verify here.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// Argon2id implementation of [`CredentialHasher`]
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    config: PasswordConfig,
}

impl Argon2Hasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        hash_password_with_config(plaintext, &self.config)
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, PasswordError> {
        verify_password(plaintext, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(PasswordConfig::minimal())
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hasher = hasher();
        let hash = hasher.hash("SecureP@ssw0rd!").expect("Failed to hash password");

        assert!(hasher.verify("SecureP@ssw0rd!", &hash).expect("Verification failed"));
        assert!(!hasher.verify("WrongPassword", &hash).expect("Verification failed"));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        // Due to random salt, same password should produce different hashes
        let hasher = hasher();
        let hash1 = hasher.hash("SamePassword123!").unwrap();
        let hash2 = hasher.hash("SamePassword123!").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify("SamePassword123!", &hash1).unwrap());
        assert!(hasher.verify("SamePassword123!", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = hasher().verify("password", "invalid-hash-format");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_custom_config() {
        let config = PasswordConfig {
            memory_cost: 32768,
            time_cost: 2,
            parallelism: 2,
            output_len: Some(32),
        };

        let hash = hash_password_with_config("TestPassword123!", &config).unwrap();

        assert!(verify_password("TestPassword123!", &hash).unwrap());
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=32768"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=2"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_hash_round_trip(password in "[ -~]{1,40}", other in "[ -~]{1,40}") {
            let hasher = hasher();
            let hash = hasher.hash(&password).unwrap();

            prop_assert!(hasher.verify(&password, &hash).unwrap());
            if other != password {
                prop_assert!(!hasher.verify(&other, &hash).unwrap());
            }
        }
    }
}
