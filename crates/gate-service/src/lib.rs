//! Gate Service Library
//!
//! Bearer-token authentication core for Watchtower API backends. The gate
//! accepts tokens from two families through a single pipeline: symmetric
//! tokens verified against a shared secret, and asymmetric tokens verified
//! against keys fetched from a remote JWKS endpoint and cached per key ID.
//!
//! # Modules
//!
//! - `auth` - Token verification pipeline, claims, and key set cache
//! - `config` - Environment-based configuration
//! - `errors` - Error taxonomy and the single generic HTTP rejection
//! - `middleware` - Axum middleware for protected routes
//! - `observability` - Metrics recording

/// Token verification pipeline, claims, and key set cache.
pub mod auth;

/// Environment-based configuration.
pub mod config;

/// Error taxonomy and HTTP response mapping.
pub mod errors;

/// Axum middleware for protected routes.
pub mod middleware;

/// Metrics recording.
pub mod observability;
