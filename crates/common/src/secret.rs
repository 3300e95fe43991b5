//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate with Watchtower-specific
//! guidance. Use these types for all sensitive values like shared verification
//! secrets, API keys, and cryptographic material.
//!
//! # Compile-Time Safety
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so any
//! code that derives `Debug` on a struct containing secrets automatically gets
//! safe logging behavior. This makes it **impossible** to accidentally log
//! secrets via `{:?}` or tracing.
//!
//! # Memory Safety
//!
//! Secrets are automatically zeroized when dropped, preventing sensitive
//! data from lingering in memory after use.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct VerifierConfig {
//!     issuer: String,
//!     shared_secret: SecretString, // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let config = VerifierConfig {
//!     issuer: "https://auth.example.com".to_string(),
//!     shared_secret: SecretString::from("hmac-key-material"),
//! };
//!
//! // This is safe - the secret is redacted
//! println!("{:?}", config);
//!
//! // To access the actual value, you must explicitly call expose_secret()
//! let key_bytes: &[u8] = config.shared_secret.expose_secret().as_bytes();
//! ```
//!
//! # Watchtower Usage Guidelines
//!
//! Use `SecretString` for:
//! - The HMAC shared verification secret
//! - API keys and bearer tokens held by outbound clients
//! - Encryption keys (as base64 strings)
//!
//! Use `SecretBox<T>` for:
//! - Custom secret types (e.g., `SecretBox<[u8]>` for binary keys)
//!
//! The only place a secret should be exposed is the single call site that
//! hands it to the cryptographic API; everything in between carries the
//! wrapped type.

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
