//! Common utilities and types shared across Watchtower components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (header inspection, time claim checks)
pub mod jwt;
