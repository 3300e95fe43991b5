//! JWKS fetching and per-key-ID caching for asymmetric verification.
//!
//! Keys are fetched from the identity provider's `/.well-known/jwks.json`
//! endpoint and cached per key ID with a TTL. An expired entry is not
//! discarded immediately: if a refresh attempt fails, the stale entry may
//! still be served for a bounded grace period so that a provider outage
//! does not take authentication down with it.
//!
//! # Security
//!
//! - A successful fetch is authoritative: a key ID absent from the fresh
//!   document fails resolution outright, so a rotated-out key stops
//!   verifying as soon as the provider says so.
//! - Stale keys are only ever served when the provider cannot be reached,
//!   and never past the grace deadline.
//! - HTTPS should be used in production (enforced by deployment config).

use crate::errors::AuthError;
use crate::observability::metrics::{record_key_cache_lookup, record_key_set_fetch};
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::instrument;

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for keys this service can use).
    pub kty: String,

    /// Key ID, used to select the key a token was signed with.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url, no padding, big-endian).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url, no padding, big-endian).
    #[serde(default)]
    pub e: Option<String>,

    /// Key use (typically "sig"). Not consulted for key selection.
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Why a key set fetch produced no usable keys.
///
/// Internal detail for logs. At the resolution boundary every variant
/// collapses into `AuthError::KeyResolutionFailure` (possibly after a
/// stale key was served instead).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySetError {
    #[error("key set request failed: {0}")]
    Request(String),

    #[error("key set endpoint returned status {0}")]
    Status(u16),

    #[error("key set payload malformed: {0}")]
    Malformed(String),

    #[error("key set contained no usable keys")]
    Empty,
}

/// Source of the remote key set document.
///
/// The cache owns refresh policy; a source only knows how to fetch one
/// document. Production uses [`HttpKeySetSource`]; tests inject
/// programmable fakes.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Fetch the current key set document.
    async fn fetch_key_set(&self) -> Result<JwkSet, KeySetError>;
}

/// HTTP key set source backed by a reqwest client.
pub struct HttpKeySetSource {
    /// Full URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client with the configured fetch timeout.
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source for the given JWKS URL.
    #[must_use]
    pub fn new(jwks_url: String, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gate.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
        }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch_key_set(&self) -> Result<JwkSet, KeySetError> {
        tracing::debug!(target: "gate.auth.jwks", url = %self.jwks_url, "Fetching key set");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to fetch key set");
                KeySetError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "gate.auth.jwks",
                status = %status,
                "Key set endpoint returned error"
            );
            return Err(KeySetError::Status(status.as_u16()));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!(target: "gate.auth.jwks", error = %e, "Failed to parse key set response");
            KeySetError::Malformed(e.to_string())
        })
    }
}

/// One cached verification key.
///
/// Entries are replaced wholesale on a successful fetch and never mutated
/// in place. `expires_at` is always `fetched_at + ttl`.
struct CacheEntry {
    /// Prepared verification key.
    key: DecodingKey,

    /// When the key was installed. Only used to report key age in logs.
    fetched_at: Instant,

    /// When the key stops being fresh.
    expires_at: Instant,
}

/// Per-key-ID cache over a [`KeySetSource`].
///
/// Thread-safe: concurrent resolutions share the read path, and a refresh
/// is performed while holding the write lock so at most one fetch is in
/// flight at a time. Every caller waiting on that refresh observes its
/// outcome.
pub struct JwksCache {
    /// Where key set documents come from.
    source: Arc<dyn KeySetSource>,

    /// How long an installed key stays fresh.
    ttl: Duration,

    /// How long past expiry a key may still serve after a failed refresh.
    grace_period: Duration,

    /// Key ID to cached entry.
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl JwksCache {
    /// Cache backed by an HTTP source. This is the production path.
    #[must_use]
    pub fn new(
        jwks_url: String,
        ttl: Duration,
        grace_period: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self::with_source(
            Arc::new(HttpKeySetSource::new(jwks_url, fetch_timeout)),
            ttl,
            grace_period,
        )
    }

    /// Cache over an arbitrary source. Tests use this to inject fakes.
    #[must_use]
    pub fn with_source(
        source: Arc<dyn KeySetSource>,
        ttl: Duration,
        grace_period: Duration,
    ) -> Self {
        Self {
            source,
            ttl,
            grace_period,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the verification key for `kid`.
    ///
    /// Fast path: a fresh cached entry under the read lock. Otherwise the
    /// write lock is taken, freshness is re-checked (a concurrent caller
    /// may have refreshed while we waited), and the key set is fetched.
    ///
    /// A successful fetch installs every returned key as fresh and is
    /// authoritative: a `kid` absent from it fails resolution even if a
    /// stale copy is still cached. Stale entries within the grace period
    /// only ever serve when the fetch itself failed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyResolutionFailure` when no key can be
    /// produced under these rules.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(kid) {
                if Instant::now() < entry.expires_at {
                    tracing::debug!(target: "gate.auth.jwks", kid = %kid, "Key cache hit");
                    record_key_cache_lookup("hit");
                    return Ok(entry.key.clone());
                }
            }
        }

        // Slow path: serialize refreshes behind the write lock
        let mut cache = self.cache.write().await;

        if let Some(entry) = cache.get(kid) {
            if Instant::now() < entry.expires_at {
                tracing::debug!(target: "gate.auth.jwks", kid = %kid, "Key cache hit after lock handoff");
                record_key_cache_lookup("hit");
                return Ok(entry.key.clone());
            }
        }

        match self.fetch_usable_keys().await {
            Ok(fresh_keys) => {
                record_key_set_fetch("success");

                let resolved = fresh_keys.get(kid).cloned();
                let key_count = fresh_keys.len();

                let now = Instant::now();
                let expires_at = now + self.ttl;
                for (key_id, key) in fresh_keys {
                    cache.insert(
                        key_id,
                        CacheEntry {
                            key,
                            fetched_at: now,
                            expires_at,
                        },
                    );
                }
                tracing::info!(target: "gate.auth.jwks", key_count, "Key set refreshed");

                match resolved {
                    Some(key) => {
                        record_key_cache_lookup("refreshed");
                        Ok(key)
                    }
                    None => {
                        // The fresh document is authoritative for current
                        // key material. A kid it does not carry may have
                        // been rotated out; serving a stale copy here would
                        // keep accepting signatures from a retired key.
                        tracing::warn!(
                            target: "gate.auth.jwks",
                            kid = %kid,
                            key_count,
                            "Key ID absent from refreshed key set"
                        );
                        record_key_cache_lookup("miss");
                        Err(AuthError::KeyResolutionFailure)
                    }
                }
            }
            Err(err) => {
                record_key_set_fetch("error");

                // Failed fetch leaves the cache untouched; a stale entry
                // may still serve within the grace period
                if let Some(entry) = cache.get(kid) {
                    let now = Instant::now();
                    if now < entry.expires_at + self.grace_period {
                        let age_secs = now.duration_since(entry.fetched_at).as_secs();
                        tracing::warn!(
                            target: "gate.auth.jwks",
                            kid = %kid,
                            error = %err,
                            age_secs,
                            "Key set fetch failed, serving stale key within grace period"
                        );
                        record_key_cache_lookup("stale");
                        return Ok(entry.key.clone());
                    }
                }

                tracing::warn!(
                    target: "gate.auth.jwks",
                    kid = %kid,
                    error = %err,
                    "Key set fetch failed with no stale key within grace period"
                );
                record_key_cache_lookup("miss");
                Err(AuthError::KeyResolutionFailure)
            }
        }
    }

    /// Fetch the document and decode its usable RSA keys.
    ///
    /// An empty result is a fetch failure: installing it would wipe the
    /// distinction between "provider rotated everything out" and
    /// "provider returned garbage", and the stale-grace rules should apply.
    async fn fetch_usable_keys(&self) -> Result<HashMap<String, DecodingKey>, KeySetError> {
        let document = self.source.fetch_key_set().await?;
        let keys = build_key_map(&document)?;
        if keys.is_empty() {
            tracing::error!(target: "gate.auth.jwks", "Key set contained no usable keys");
            return Err(KeySetError::Empty);
        }
        Ok(keys)
    }
}

/// Decode every usable key in the document.
///
/// Non-RSA keys are skipped. An RSA key with missing or undecodable
/// material fails the whole document: partial installs would make cache
/// content depend on iteration order.
fn build_key_map(document: &JwkSet) -> Result<HashMap<String, DecodingKey>, KeySetError> {
    let mut keys = HashMap::new();

    for jwk in &document.keys {
        if jwk.kty != "RSA" {
            tracing::debug!(target: "gate.auth.jwks", kty = %jwk.kty, "Skipping non-RSA key in key set");
            continue;
        }

        let kid = jwk
            .kid
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| KeySetError::Malformed("RSA key missing kid".to_string()))?;

        let (n, e) = match (&jwk.n, &jwk.e) {
            (Some(n), Some(e)) => (n, e),
            _ => {
                return Err(KeySetError::Malformed(format!(
                    "RSA key '{kid}' missing modulus or exponent"
                )))
            }
        };

        let key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
            KeySetError::Malformed(format!("RSA key '{kid}' has invalid components: {err}"))
        })?;

        keys.insert(kid.to_string(), key);
    }

    Ok(keys)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // Any well-formed base64url strings will do here: RSA parameters are
    // not validated until signature verification.
    const TEST_N: &str = "3kFvv2mDPsVjthokp3hSueNwzDKhsRVQCHl7Htdtr4uG8fTvNSzru35uBsFqw10q";
    const TEST_E: &str = "AQAB";

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: Some(kid.to_string()),
            n: Some(TEST_N.to_string()),
            e: Some(TEST_E.to_string()),
            key_use: Some("sig".to_string()),
        }
    }

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "kty": "RSA",
            "kid": "key-1",
            "n": "3kFvv2mDPsVjthokp3hSueNwzDKhsRVQ",
            "e": "AQAB",
            "use": "sig"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid.as_deref(), Some("key-1"));
        assert_eq!(jwk.n.as_deref(), Some("3kFvv2mDPsVjthokp3hSueNwzDKhsRVQ"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let json = r#"{ "kty": "EC" }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "EC");
        assert!(jwk.kid.is_none());
        assert!(jwk.n.is_none());
        assert!(jwk.e.is_none());
        assert!(jwk.key_use.is_none());
    }

    #[test]
    fn test_jwk_set_deserialization() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "kid": "key-1", "n": "AQAB", "e": "AQAB"},
                {"kty": "RSA", "kid": "key-2", "n": "AQAB", "e": "AQAB"}
            ]
        }"#;

        let set: JwkSet = serde_json::from_str(json).unwrap();

        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys.first().unwrap().kid.as_deref(), Some("key-1"));
    }

    #[test]
    fn test_build_key_map_installs_rsa_keys() {
        let document = JwkSet {
            keys: vec![rsa_jwk("key-1"), rsa_jwk("key-2")],
        };

        let keys = build_key_map(&document).unwrap();

        assert_eq!(keys.len(), 2);
        assert!(keys.contains_key("key-1"));
        assert!(keys.contains_key("key-2"));
    }

    #[test]
    fn test_build_key_map_skips_non_rsa_keys() {
        let ec_key = Jwk {
            kty: "EC".to_string(),
            kid: Some("ec-key".to_string()),
            n: None,
            e: None,
            key_use: Some("sig".to_string()),
        };
        let document = JwkSet {
            keys: vec![ec_key, rsa_jwk("key-1")],
        };

        let keys = build_key_map(&document).unwrap();

        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("key-1"));
        assert!(!keys.contains_key("ec-key"));
    }

    #[test]
    fn test_build_key_map_rejects_rsa_key_without_kid() {
        let mut anonymous = rsa_jwk("");
        anonymous.kid = None;
        let document = JwkSet {
            keys: vec![rsa_jwk("key-1"), anonymous],
        };

        let result = build_key_map(&document);
        assert!(matches!(result, Err(KeySetError::Malformed(_))));
    }

    #[test]
    fn test_build_key_map_rejects_rsa_key_with_empty_kid() {
        let document = JwkSet {
            keys: vec![rsa_jwk("")],
        };

        let result = build_key_map(&document);
        assert!(matches!(result, Err(KeySetError::Malformed(_))));
    }

    #[test]
    fn test_build_key_map_rejects_missing_modulus() {
        let mut broken = rsa_jwk("key-1");
        broken.n = None;
        let document = JwkSet {
            keys: vec![broken],
        };

        let result = build_key_map(&document);
        assert!(matches!(result, Err(KeySetError::Malformed(_))));
    }

    #[test]
    fn test_build_key_map_rejects_undecodable_modulus() {
        let mut broken = rsa_jwk("key-1");
        broken.n = Some("not!valid!base64url".to_string());
        let document = JwkSet {
            keys: vec![broken],
        };

        let result = build_key_map(&document);
        assert!(matches!(result, Err(KeySetError::Malformed(_))));
    }

    #[test]
    fn test_one_bad_key_poisons_the_whole_document() {
        // Atomic install: the good key must not land either
        let mut broken = rsa_jwk("key-2");
        broken.e = None;
        let document = JwkSet {
            keys: vec![rsa_jwk("key-1"), broken],
        };

        assert!(build_key_map(&document).is_err());
    }

    #[test]
    fn test_all_non_rsa_document_yields_empty_map() {
        let ec_key = Jwk {
            kty: "EC".to_string(),
            kid: Some("ec-key".to_string()),
            n: None,
            e: None,
            key_use: None,
        };
        let document = JwkSet { keys: vec![ec_key] };

        let keys = build_key_map(&document).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_cache_construction() {
        let cache = JwksCache::new(
            "http://localhost:9000/.well-known/jwks.json".to_string(),
            Duration::from_secs(3600),
            Duration::from_secs(300),
            Duration::from_secs(10),
        );
        assert_eq!(cache.ttl, Duration::from_secs(3600));
        assert_eq!(cache.grace_period, Duration::from_secs(300));
    }
}
