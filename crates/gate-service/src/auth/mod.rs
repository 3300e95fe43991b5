//! Authentication pipeline for the Gate Service.
//!
//! # Components
//!
//! - `claims` - Typed claims and the verified [`Identity`]
//! - `jwks` - Remote key set fetching and per-key-ID caching
//! - `jwt` - Credential extraction and the [`Authenticator`] pipeline

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::{Claims, Identity};
pub use jwks::JwksCache;
pub use jwt::Authenticator;
