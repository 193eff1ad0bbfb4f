//! Pluggable credential-hash registry.
//!
//! Each account stores the tag of the algorithm that produced its hash,
//! so changing the deployment default never invalidates existing
//! credentials: verification always recomputes with the account's own
//! stored algorithm and parameters.

use rand::RngCore;
use scrypt::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use scrypt::Scrypt;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::BrokerError;

/// Algorithm tag for salted SHA-256 hashes.
pub const ALGORITHM_SHA256: &str = "sha-256";
/// Algorithm tag for scrypt PHC-format hashes.
pub const ALGORITHM_SCRYPT: &str = "scrypt";

/// Newtype for a raw password to keep it out of logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// scrypt work-factor parameters.
#[derive(Debug, Clone)]
pub struct ScryptConfig {
    /// log2 of the CPU/memory cost (N = 2^log_n).
    pub log_n: u8,
    pub block_size: u32,
    pub parallelism: u32,
    pub key_length: usize,
    pub salt_length: usize,
}

impl Default for ScryptConfig {
    fn default() -> Self {
        Self {
            log_n: 14,
            block_size: 8,
            parallelism: 1,
            key_length: 32,
            salt_length: 16,
        }
    }
}

/// Hash registry keyed by per-account algorithm tag.
#[derive(Debug, Clone)]
pub struct HashRegistry {
    default_algorithm: String,
    scrypt: ScryptConfig,
    sha256_salt_length: usize,
}

impl HashRegistry {
    pub fn new(default_algorithm: impl Into<String>, scrypt: ScryptConfig) -> Self {
        Self {
            default_algorithm: default_algorithm.into(),
            scrypt,
            sha256_salt_length: 16,
        }
    }

    pub fn default_algorithm(&self) -> &str {
        &self.default_algorithm
    }

    /// Hash a password with the named algorithm, producing the string
    /// format that `verify` for the same tag accepts.
    pub fn hash(&self, algorithm: &str, password: &Password) -> Result<String, BrokerError> {
        match algorithm {
            ALGORITHM_SHA256 => {
                let mut salt = vec![0u8; self.sha256_salt_length];
                rand::thread_rng().fill_bytes(&mut salt);
                Ok(format!(
                    "{}${}",
                    hex::encode(&salt),
                    hex::encode(sha256_digest(&salt, password))
                ))
            }
            ALGORITHM_SCRYPT => {
                let mut salt = vec![0u8; self.scrypt.salt_length];
                rand::thread_rng().fill_bytes(&mut salt);
                let salt = SaltString::encode_b64(&salt)
                    .map_err(|e| anyhow::anyhow!("salt encoding: {e}"))?;
                let params = scrypt::Params::new(
                    self.scrypt.log_n,
                    self.scrypt.block_size,
                    self.scrypt.parallelism,
                    self.scrypt.key_length,
                )
                .map_err(|e| anyhow::anyhow!("scrypt params: {e}"))?;
                let hash = Scrypt
                    .hash_password_customized(
                        password.as_str().as_bytes(),
                        None,
                        None,
                        params,
                        &salt,
                    )
                    .map_err(|e| anyhow::anyhow!("scrypt hashing: {e}"))?;
                Ok(hash.to_string())
            }
            other => Err(anyhow::anyhow!("unknown hash algorithm tag: {other}").into()),
        }
    }

    /// Hash with the deployment default algorithm.
    pub fn hash_default(&self, password: &Password) -> Result<String, BrokerError> {
        self.hash(&self.default_algorithm, password)
    }

    /// Constant-time verification against a stored hash. An unknown tag
    /// or malformed stored hash verifies false, never errors: the caller
    /// collapses every cause into the same failure.
    pub fn verify(&self, algorithm: &str, stored: &str, password: &Password) -> bool {
        match algorithm {
            ALGORITHM_SHA256 => {
                let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
                    return false;
                };
                let (Ok(salt), Ok(digest)) = (hex::decode(salt_hex), hex::decode(digest_hex))
                else {
                    return false;
                };
                let recomputed = sha256_digest(&salt, password);
                recomputed.ct_eq(&digest[..]).into()
            }
            ALGORITHM_SCRYPT => match PasswordHash::new(stored) {
                // scrypt parameters come from the stored PHC string, so
                // old hashes stay valid when the defaults change.
                Ok(parsed) => Scrypt
                    .verify_password(password.as_str().as_bytes(), &parsed)
                    .is_ok(),
                Err(_) => false,
            },
            _ => false,
        }
    }
}

impl Default for HashRegistry {
    fn default() -> Self {
        Self::new(ALGORITHM_SCRYPT, ScryptConfig::default())
    }
}

fn sha256_digest(salt: &[u8], password: &Password) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_str().as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_round_trip() {
        let registry = HashRegistry::default();
        let password = Password::new("password1");
        let stored = registry.hash(ALGORITHM_SHA256, &password).unwrap();

        assert!(registry.verify(ALGORITHM_SHA256, &stored, &password));
        assert!(!registry.verify(ALGORITHM_SHA256, &stored, &Password::new("password2")));
    }

    #[test]
    fn scrypt_round_trip() {
        let registry = HashRegistry::default();
        let password = Password::new("password1");
        let stored = registry.hash(ALGORITHM_SCRYPT, &password).unwrap();

        assert!(stored.starts_with("$scrypt$"));
        assert!(registry.verify(ALGORITHM_SCRYPT, &stored, &password));
        assert!(!registry.verify(ALGORITHM_SCRYPT, &stored, &Password::new("wrong")));
    }

    #[test]
    fn same_password_hashes_differently() {
        let registry = HashRegistry::default();
        let password = Password::new("password1");
        let a = registry.hash(ALGORITHM_SHA256, &password).unwrap();
        let b = registry.hash(ALGORITHM_SHA256, &password).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn default_change_keeps_old_hashes_valid() {
        let old = HashRegistry::new(ALGORITHM_SHA256, ScryptConfig::default());
        let password = Password::new("password1");
        let stored = old.hash_default(&password).unwrap();

        // Deployment later switches the default to scrypt with bigger
        // work factors; the account's stored tag still verifies.
        let new = HashRegistry::new(
            ALGORITHM_SCRYPT,
            ScryptConfig {
                log_n: 15,
                ..ScryptConfig::default()
            },
        );
        assert!(new.verify(ALGORITHM_SHA256, &stored, &password));
    }

    #[test]
    fn unknown_tag_verifies_false() {
        let registry = HashRegistry::default();
        assert!(!registry.verify("md5", "whatever", &Password::new("x")));
    }
}
