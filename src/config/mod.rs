use serde::Deserialize;
use std::env;

use crate::error::BrokerError;
use crate::utils::password::ScryptConfig;

/// Default access-token lifetime and the upper bound for the
/// `expires_in` request override, in seconds.
pub const ACCESS_TOKEN_EXPIRES_SECS: i64 = 3600;
/// Default refresh-token lifetime and the upper bound for the
/// `refresh_token_expires_in` request override, in seconds.
pub const REFRESH_TOKEN_EXPIRES_SECS: i64 = 86400;
/// Grant-code lifetime, in seconds.
pub const GRANT_CODE_EXPIRES_SECS: i64 = 600;

/// Top-level broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Unit root URL; every cell URL hangs under it.
    pub unit_url: String,
    /// Secret for HS256 signing of local token kinds.
    pub master_secret: String,
    /// PEM paths for the trans-cell signing key and its certificate.
    pub signing_key_path: String,
    pub signing_cert_path: String,
    /// PEM paths of the trusted root CA certificates.
    pub root_ca_paths: Vec<String>,
    pub lockout: LockoutConfig,
    pub token: TokenConfig,
    pub hash: HashConfig,
}

/// Lockout thresholds and intervals, passed explicitly into the guard
/// so tests can parameterize without shared state.
#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    /// Consecutive failures before the count-based lock engages.
    /// 0 disables the count-based lock.
    pub lock_count: u32,
    /// Seconds a count-based lock stays active.
    pub lock_time_secs: i64,
    /// Minimum seconds between two attempts against one account.
    pub valid_authn_interval_secs: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            lock_count: 0,
            lock_time_secs: 300,
            valid_authn_interval_secs: 1,
        }
    }
}

/// Token lifetime defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub access_token_secs: i64,
    pub refresh_token_secs: i64,
    pub grant_code_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_secs: ACCESS_TOKEN_EXPIRES_SECS,
            refresh_token_secs: REFRESH_TOKEN_EXPIRES_SECS,
            grant_code_secs: GRANT_CODE_EXPIRES_SECS,
        }
    }
}

/// Credential-hash policy: the deployment default plus scrypt work
/// factors for newly stored hashes.
#[derive(Debug, Clone)]
pub struct HashConfig {
    pub default_algorithm: String,
    pub scrypt: ScryptConfig,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            default_algorithm: crate::utils::password::ALGORITHM_SCRYPT.to_string(),
            scrypt: ScryptConfig::default(),
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self, BrokerError> {
        let is_prod = env::var("ENVIRONMENT")
            .map(|v| v.eq_ignore_ascii_case("prod"))
            .unwrap_or(false);

        let config = BrokerConfig {
            unit_url: get_env("UNIT_URL", None, is_prod)?,
            master_secret: get_env("TOKEN_MASTER_SECRET", None, true)?,
            signing_key_path: get_env("SIGNING_KEY_PATH", None, is_prod)?,
            signing_cert_path: get_env("SIGNING_CERT_PATH", None, is_prod)?,
            root_ca_paths: get_env("ROOT_CA_PATHS", Some(""), is_prod)?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            lockout: LockoutConfig {
                lock_count: parse_env("AUTHN_ACCOUNT_LOCK_COUNT", "0", is_prod)?,
                lock_time_secs: parse_env("AUTHN_ACCOUNT_LOCK_TIME", "300", is_prod)?,
                valid_authn_interval_secs: parse_env("AUTHN_VALID_INTERVAL", "1", is_prod)?,
            },
            token: TokenConfig {
                access_token_secs: parse_env("ACCESS_TOKEN_EXPIRES_SECS", "3600", is_prod)?,
                refresh_token_secs: parse_env("REFRESH_TOKEN_EXPIRES_SECS", "86400", is_prod)?,
                grant_code_secs: parse_env("GRANT_CODE_EXPIRES_SECS", "600", is_prod)?,
            },
            hash: HashConfig {
                default_algorithm: get_env("HASH_DEFAULT_ALGORITHM", Some("scrypt"), is_prod)?,
                scrypt: ScryptConfig {
                    log_n: parse_env("HASH_SCRYPT_LOG_N", "14", is_prod)?,
                    block_size: parse_env("HASH_SCRYPT_BLOCK_SIZE", "8", is_prod)?,
                    parallelism: parse_env("HASH_SCRYPT_PARALLELISM", "1", is_prod)?,
                    key_length: parse_env("HASH_SCRYPT_KEY_LENGTH", "32", is_prod)?,
                    salt_length: parse_env("HASH_SCRYPT_SALT_LENGTH", "16", is_prod)?,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BrokerError> {
        if url::Url::parse(&self.unit_url).is_err() {
            return Err(anyhow::anyhow!("UNIT_URL must be an absolute URL").into());
        }
        if self.token.access_token_secs <= 0 || self.token.refresh_token_secs <= 0 {
            return Err(anyhow::anyhow!("token lifetimes must be positive").into());
        }
        if self.lockout.lock_count > 0 && self.lockout.lock_time_secs <= 0 {
            return Err(anyhow::anyhow!(
                "AUTHN_ACCOUNT_LOCK_TIME must be positive when the lock is enabled"
            )
            .into());
        }
        if self.lockout.valid_authn_interval_secs < 0 {
            return Err(anyhow::anyhow!("AUTHN_VALID_INTERVAL must not be negative").into());
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, BrokerError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(anyhow::anyhow!("{key} is required in production but not set").into())
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(anyhow::anyhow!("{key} is required but not set").into())
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, BrokerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e| anyhow::anyhow!("{key}: {e}").into())
}
