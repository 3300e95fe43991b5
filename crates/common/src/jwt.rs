//! JWT utilities shared across Watchtower services.
//!
//! This module provides the token-level primitives used by the
//! authentication pipeline:
//! - Size limits for DoS prevention
//! - Unverified header inspection (algorithm family dispatch, key ID capture)
//! - Deterministic `exp`/`nbf` validation
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The algorithm set is closed: HS256/HS384/HS512 and RS256/RS384/RS512.
//!   `alg: none` and every other value are rejected; there is no way to
//!   widen the set through configuration.
//! - The algorithm chosen here is carried to signature verification verbatim
//!   and never re-derived from the token later.
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{inspect_header, AlgorithmFamily, MAX_JWT_SIZE_BYTES};
//!
//! let header = inspect_header(token)?;
//! match header.family {
//!     AlgorithmFamily::Hmac => { /* verify with the shared secret */ }
//!     AlgorithmFamily::Rsa => { /* resolve header.key_id against the JWKS cache */ }
//! }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// This limit prevents denial-of-service attacks via oversized tokens.
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations, providing defense-in-depth against resource exhaustion attacks.
///
/// # Rationale
///
/// - Typical JWTs are 200-500 bytes (header + claims + signature)
/// - 8KB allows for reasonable claim growth while preventing abuse
/// - Checked BEFORE base64 decode and signature verification for efficiency
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during token-level validation.
///
/// Note: Error messages are intentionally generic to prevent information
/// leakage. Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token algorithm is outside the closed supported set.
    #[error("The access token is invalid or expired")]
    UnsupportedAlgorithm,

    /// Asymmetric token is missing the required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKeyId,

    /// Token `exp` claim is at or before the current time.
    #[error("The access token is invalid or expired")]
    Expired,

    /// Token `nbf` claim is in the future.
    #[error("The access token is invalid or expired")]
    NotYetValid,
}

// =============================================================================
// Algorithm Dispatch
// =============================================================================

/// The two token families the pipeline verifies.
///
/// This is the single dispatch point for algorithm handling: the family is
/// decided once, during unverified header inspection, and determines which
/// key material is resolved. Downstream code matches on this enum and never
/// consults the token's `alg` field again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    /// HMAC with a locally configured shared secret (HS256/HS384/HS512).
    Hmac,
    /// RSA with a public key resolved from the remote key set (RS256/RS384/RS512).
    Rsa,
}

impl AlgorithmFamily {
    /// Stable lowercase label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmFamily::Hmac => "hmac",
            AlgorithmFamily::Rsa => "rsa",
        }
    }
}

/// Result of unverified header inspection.
///
/// Carries everything key resolution and verification need: the exact
/// algorithm member, its family, and the key ID when the family requires one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// The exact algorithm named by the token, validated against the closed set.
    pub algorithm: Algorithm,
    /// Family derived from `algorithm`; selects the key resolution path.
    pub family: AlgorithmFamily,
    /// Key ID for asymmetric tokens. Always `Some` when `family` is `Rsa`;
    /// ignored (but preserved) for symmetric tokens.
    pub key_id: Option<String>,
}

/// Map an `alg` header value onto the closed supported set.
///
/// Everything outside the six supported members is rejected, including the
/// explicit `none` algorithm in any casing.
fn match_algorithm(alg: &str) -> Option<(Algorithm, AlgorithmFamily)> {
    match alg {
        "HS256" => Some((Algorithm::HS256, AlgorithmFamily::Hmac)),
        "HS384" => Some((Algorithm::HS384, AlgorithmFamily::Hmac)),
        "HS512" => Some((Algorithm::HS512, AlgorithmFamily::Hmac)),
        "RS256" => Some((Algorithm::RS256, AlgorithmFamily::Rsa)),
        "RS384" => Some((Algorithm::RS384, AlgorithmFamily::Rsa)),
        "RS512" => Some((Algorithm::RS512, AlgorithmFamily::Rsa)),
        _ => None,
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Inspect a JWT header without verifying the signature.
///
/// Decodes the first segment of the token and resolves the algorithm family
/// and key ID used for key lookup. The token MUST still be verified with the
/// resolved key afterwards; nothing this function returns is trusted beyond
/// routing the verification.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - `alg: none` is rejected unconditionally, so a stripped-signature token
///   can never route around verification
/// - Asymmetric tokens without a usable `kid` are rejected here, before any
///   network activity
///
/// # Errors
///
/// Returns `TokenError` variants:
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong segment count, bad base64, bad JSON, or no `alg`
/// - `UnsupportedAlgorithm` - `alg` outside the closed set (including `none`)
/// - `MissingKeyId` - RSA-family token without a non-empty string `kid`
pub fn inspect_header(token: &str) -> Result<TokenHeader, TokenError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(TokenError::MalformedToken);
    }

    let header_part = parts.first().ok_or(TokenError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        TokenError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        TokenError::MalformedToken
    })?;

    let alg = header.get("alg").and_then(|v| v.as_str()).ok_or_else(|| {
        tracing::debug!(target: "common.jwt", "Token rejected: header has no alg field");
        TokenError::MalformedToken
    })?;

    let (algorithm, family) = match_algorithm(alg).ok_or_else(|| {
        tracing::debug!(
            target: "common.jwt",
            alg = alg,
            "Token rejected: algorithm outside supported set"
        );
        TokenError::UnsupportedAlgorithm
    })?;

    // Extract kid as string, rejecting empty values for defense-in-depth
    let key_id = header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    // The RSA path cannot select a key without a kid; fail before any fetch
    if family == AlgorithmFamily::Rsa && key_id.is_none() {
        tracing::debug!(
            target: "common.jwt",
            "Token rejected: RSA-family token without usable kid header"
        );
        return Err(TokenError::MissingKeyId);
    }

    Ok(TokenHeader {
        algorithm,
        family,
        key_id,
    })
}

/// Validate the `exp` (expiration) claim against the current wall clock.
///
/// The boundary is inclusive on the failure side: a token whose `exp` equals
/// the current second is already expired.
///
/// # Errors
///
/// Returns `TokenError::Expired` if `exp` is at or before the current time.
pub fn validate_expiry(exp: i64) -> Result<(), TokenError> {
    validate_expiry_at(exp, chrono::Utc::now().timestamp())
}

/// Deterministic `exp` validation against an explicit `now` timestamp.
///
/// This variant exists so a caller can take one clock snapshot for all of a
/// token's time claims, and so boundary conditions can be unit-tested without
/// wall-clock dependence.
///
/// # Errors
///
/// Returns `TokenError::Expired` if `exp <= now`.
pub fn validate_expiry_at(exp: i64, now: i64) -> Result<(), TokenError> {
    if exp <= now {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            "Token rejected: expired"
        );
        return Err(TokenError::Expired);
    }

    Ok(())
}

/// Validate the `nbf` (not-before) claim against the current wall clock.
///
/// A token becomes valid at exactly `nbf`: `nbf == now` is accepted.
///
/// # Errors
///
/// Returns `TokenError::NotYetValid` if `nbf` is in the future.
pub fn validate_not_before(nbf: i64) -> Result<(), TokenError> {
    validate_not_before_at(nbf, chrono::Utc::now().timestamp())
}

/// Deterministic `nbf` validation against an explicit `now` timestamp.
///
/// # Errors
///
/// Returns `TokenError::NotYetValid` if `nbf > now`.
pub fn validate_not_before_at(nbf: i64, now: i64) -> Result<(), TokenError> {
    if nbf > now {
        tracing::debug!(
            target: "common.jwt",
            nbf = nbf,
            now = now,
            "Token rejected: not yet valid"
        );
        return Err(TokenError::NotYetValid);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
