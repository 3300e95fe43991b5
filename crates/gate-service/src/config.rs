//! Gate Service configuration.
//!
//! Loads configuration from environment variables. Both token families are
//! optional: the symmetric family needs `JWT_SECRET`, the asymmetric family
//! needs `JWKS_BASE_URL`. Leaving one unset disables that family without
//! failing startup; presenting a token from a disabled family is rejected
//! at authentication time instead.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default key cache TTL in seconds (1 hour).
pub const DEFAULT_KEY_CACHE_TTL_SECONDS: u64 = 3600;

/// Default grace period in seconds during which an expired cached key may
/// still be served after a failed refresh (5 minutes).
pub const DEFAULT_KEY_GRACE_PERIOD_SECONDS: u64 = 300;

/// Default timeout in seconds for a single JWKS fetch.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Well-known path appended to the JWKS base URL.
pub const JWKS_WELL_KNOWN_PATH: &str = "/.well-known/jwks.json";

/// Gate Service configuration.
#[derive(Clone)]
pub struct Config {
    /// Shared secret for symmetric (HMAC) token verification.
    /// `None` disables the symmetric family.
    pub shared_secret: Option<SecretString>,

    /// Base URL of the identity provider serving the JWKS document.
    /// `None` disables the asymmetric family.
    pub jwks_base_url: Option<String>,

    /// How long a fetched verification key is considered fresh.
    pub key_cache_ttl: Duration,

    /// How long past expiry a cached key may still be served when a
    /// refresh attempt fails. Zero disables stale serving.
    pub key_grace_period: Duration,

    /// Timeout for a single JWKS fetch.
    pub jwks_fetch_timeout: Duration,
}

// Manual Debug to keep the shared secret out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "shared_secret",
                &self.shared_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwks_base_url", &self.jwks_base_url)
            .field("key_cache_ttl", &self.key_cache_ttl)
            .field("key_grace_period", &self.key_grace_period)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .finish()
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid KEY_CACHE_TTL_SECONDS: {0}")]
    InvalidKeyCacheTtl(String),

    #[error("Invalid KEY_GRACE_PERIOD_SECONDS: {0}")]
    InvalidKeyGracePeriod(String),

    #[error("Invalid JWKS_FETCH_TIMEOUT_SECONDS: {0}")]
    InvalidJwksFetchTimeout(String),
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a duration variable is present but not a
    /// positive integer. Absent secret or base URL is not an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from the given variable map.
    ///
    /// Separated from [`Config::from_env`] so tests can exercise parsing
    /// and validation without touching the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a duration variable is present but not a
    /// positive integer.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        // Empty counts as unset so a blank override disables the family
        let shared_secret = vars
            .get("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.clone()));

        let jwks_base_url = vars
            .get("JWKS_BASE_URL")
            .filter(|s| !s.is_empty())
            .cloned();

        let key_cache_ttl_seconds = if let Some(value_str) = vars.get("KEY_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidKeyCacheTtl(format!(
                    "must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            if value == 0 {
                return Err(ConfigError::InvalidKeyCacheTtl(
                    "must be positive, got 0".to_string(),
                ));
            }
            value
        } else {
            DEFAULT_KEY_CACHE_TTL_SECONDS
        };

        // Zero is allowed here: it disables stale serving entirely
        let key_grace_period_seconds =
            if let Some(value_str) = vars.get("KEY_GRACE_PERIOD_SECONDS") {
                value_str.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidKeyGracePeriod(format!(
                        "must be a non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?
            } else {
                DEFAULT_KEY_GRACE_PERIOD_SECONDS
            };

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwksFetchTimeout(format!(
                        "must be a non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidJwksFetchTimeout(
                        "must be positive, got 0".to_string(),
                    ));
                }
                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        Ok(Config {
            shared_secret,
            jwks_base_url,
            key_cache_ttl: Duration::from_secs(key_cache_ttl_seconds),
            key_grace_period: Duration::from_secs(key_grace_period_seconds),
            jwks_fetch_timeout: Duration::from_secs(jwks_fetch_timeout_seconds),
        })
    }

    /// Full JWKS document URL, or `None` when the asymmetric family is
    /// disabled. Trailing slashes on the base URL are tolerated.
    #[must_use]
    pub fn jwks_url(&self) -> Option<String> {
        self.jwks_base_url
            .as_ref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), JWKS_WELL_KNOWN_PATH))
    }
}
