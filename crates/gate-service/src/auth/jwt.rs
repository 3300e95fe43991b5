//! Credential extraction and token verification pipeline.
//!
//! The [`Authenticator`] turns a raw `Authorization` header value into a
//! verified [`Identity`], or one classified error. Two token families run
//! through the same pipeline: HMAC tokens verified against the shared
//! secret, and RSA tokens verified against a key resolved from the JWKS
//! cache by key ID.
//!
//! # Security
//!
//! - The algorithm is pinned from the (unverified) token header before any
//!   cryptography: the key source is chosen by family, so an HMAC token can
//!   never be verified against public RSA material or vice versa
//! - Tokens are size-checked before parsing (DoS prevention)
//! - `exp` is mandatory and inclusive: a token expiring this second is
//!   already expired
//! - Generic error messages prevent information leakage

use crate::auth::claims::{Claims, Identity};
use crate::auth::jwks::JwksCache;
use crate::config::Config;
use crate::errors::AuthError;
use crate::observability::metrics::record_authentication;
use common::jwt::{self, AlgorithmFamily, TokenHeader};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::instrument;

/// Extract the bearer token from an `Authorization` header value.
///
/// The format is strict: exactly the scheme `Bearer`, one space, one
/// non-empty token. A different scheme, extra segments, or doubled spaces
/// are malformed rather than leniently parsed.
///
/// # Errors
///
/// - `AuthError::MissingCredential` - header absent or empty
/// - `AuthError::MalformedCredential` - any other shape
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.filter(|v| !v.is_empty()).ok_or_else(|| {
        tracing::debug!(target: "gate.auth", "Missing Authorization header");
        AuthError::MissingCredential
    })?;

    let mut segments = value.split(' ');
    match (segments.next(), segments.next(), segments.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => {
            tracing::debug!(target: "gate.auth", "Invalid Authorization header format");
            Err(AuthError::MalformedCredential)
        }
    }
}

/// Bearer-token authenticator for both token families.
///
/// Either family may be left unconfigured; presenting a token from a
/// disabled family fails key resolution at authentication time.
pub struct Authenticator {
    /// Shared secret for the HMAC family.
    shared_secret: Option<SecretString>,

    /// Key cache for the RSA family.
    key_cache: Option<JwksCache>,
}

impl Authenticator {
    /// Build an authenticator from configuration. The JWKS cache is only
    /// constructed when a base URL is configured.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let key_cache = config.jwks_url().map(|url| {
            JwksCache::new(
                url,
                config.key_cache_ttl,
                config.key_grace_period,
                config.jwks_fetch_timeout,
            )
        });

        Self {
            shared_secret: config.shared_secret.clone(),
            key_cache,
        }
    }

    /// Assemble an authenticator from parts. [`Authenticator::from_config`]
    /// is the production path; this exists for tests and bespoke wiring.
    #[must_use]
    pub fn new(shared_secret: Option<SecretString>, key_cache: Option<JwksCache>) -> Self {
        Self {
            shared_secret,
            key_cache,
        }
    }

    /// Authenticate an `Authorization` header value into a verified
    /// [`Identity`].
    ///
    /// # Pipeline
    ///
    /// 1. Extract the bearer token (strict `Bearer <token>` format)
    /// 2. Inspect the unverified header: algorithm family and key ID
    /// 3. Resolve the verification key for that family
    /// 4. Verify the signature with the pinned algorithm, then check time
    ///    claims against a single clock snapshot
    /// 5. Select the identity claim (`sub`, `user_id`, `id`)
    ///
    /// # Errors
    ///
    /// One [`AuthError`] kind per failure mode. At the HTTP boundary all of
    /// them render as the same generic 401.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        let result = self.authenticate_inner(header).await;

        match &result {
            Ok(_) => record_authentication("success", None),
            Err(err) => record_authentication("error", Some(err.kind())),
        }

        result
    }

    async fn authenticate_inner(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        let token = extract_bearer_token(header)?;
        let token_header = jwt::inspect_header(token)?;
        let decoding_key = self.resolve_key(&token_header).await?;
        let claims = verify_claims(token, token_header.algorithm, &decoding_key)?;

        let subject = claims.subject().ok_or_else(|| {
            tracing::debug!(target: "gate.auth", "Verified token carries no usable identity claim");
            AuthError::ClaimMissing
        })?;

        tracing::debug!(
            target: "gate.auth",
            family = token_header.family.as_str(),
            "Token verified"
        );

        Ok(Identity {
            subject: subject.to_string(),
        })
    }

    /// Pick the verification key for the token's algorithm family.
    ///
    /// This is the only place a key is ever paired with a token, which is
    /// what makes algorithm-confusion attacks structurally impossible:
    /// the family fixes the key source before any verification happens.
    async fn resolve_key(&self, header: &TokenHeader) -> Result<DecodingKey, AuthError> {
        match header.family {
            AlgorithmFamily::Hmac => {
                let secret = self.shared_secret.as_ref().ok_or_else(|| {
                    tracing::debug!(
                        target: "gate.auth",
                        "Symmetric token presented but no shared secret is configured"
                    );
                    AuthError::KeyResolutionFailure
                })?;
                Ok(DecodingKey::from_secret(secret.expose_secret().as_bytes()))
            }
            AlgorithmFamily::Rsa => {
                let cache = self.key_cache.as_ref().ok_or_else(|| {
                    tracing::debug!(
                        target: "gate.auth",
                        "Asymmetric token presented but no key set URL is configured"
                    );
                    AuthError::KeyResolutionFailure
                })?;
                // Header inspection guarantees a kid for this family
                let kid = header
                    .key_id
                    .as_deref()
                    .ok_or(AuthError::MalformedCredential)?;
                cache.resolve(kid).await
            }
        }
    }
}

/// Verify the signature with the resolved key and decode the typed claims,
/// then check time claims.
///
/// Library `exp`/`nbf` checking is disabled in favor of the deterministic
/// checks in `common::jwt`: both claims are compared against one clock
/// snapshot, `exp == now` is already expired, and `nbf == now` is already
/// valid.
fn verify_claims(
    token: &str,
    algorithm: Algorithm,
    key: &DecodingKey,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;

    let token_data = decode::<Claims>(token, key, &validation).map_err(|e| {
        tracing::debug!(target: "gate.auth", error = %e, "Token verification failed");
        AuthError::SignatureInvalid
    })?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    jwt::validate_expiry_at(claims.exp, now)?;
    if let Some(nbf) = claims.nbf {
        jwt::validate_not_before_at(nbf, now)?;
    }

    Ok(claims)
}
