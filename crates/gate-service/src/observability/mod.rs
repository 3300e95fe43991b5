//! Observability for the Gate Service.
//!
//! # Components
//!
//! - `metrics` - Counters for authentication and key cache outcomes

pub mod metrics;
