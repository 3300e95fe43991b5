//! Metrics definitions for the Gate Service
//!
//! All metrics follow Prometheus naming conventions:
//! - `gate_` prefix for service identification
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Every label is drawn from a small fixed set:
//! - `status`: success, error
//! - `error_kind`: the seven authentication failure kinds, or "none"
//! - `cache_status`: hit, refreshed, stale, miss

use metrics::counter;

/// Record an authentication attempt outcome
///
/// Metric: `gate_authentications_total`
/// Labels: `status` (success/error), `error_kind` (failure kind or "none")
pub fn record_authentication(status: &str, error_kind: Option<&str>) {
    counter!(
        "gate_authentications_total",
        "status" => status.to_string(),
        "error_kind" => error_kind.unwrap_or("none").to_string()
    )
    .increment(1);
}

/// Record a key set fetch outcome
///
/// Metric: `gate_key_set_fetches_total`
/// Labels: `status` (success/error)
pub fn record_key_set_fetch(status: &str) {
    counter!(
        "gate_key_set_fetches_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a key cache lookup outcome
///
/// Metric: `gate_key_cache_lookups_total`
/// Labels: `cache_status` (hit/refreshed/stale/miss)
pub fn record_key_cache_lookup(cache_status: &str) {
    counter!(
        "gate_key_cache_lookups_total",
        "cache_status" => cache_status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests verify the functions are callable with every label value
    // the service emits. Without a recorder installed the calls hit the
    // global no-op recorder.

    #[test]
    fn test_record_authentication_success() {
        record_authentication("success", None);
    }

    #[test]
    fn test_record_authentication_error_kinds() {
        for kind in [
            "missing_credential",
            "malformed_credential",
            "unsupported_algorithm",
            "key_resolution_failure",
            "signature_invalid",
            "expired",
            "claim_missing",
        ] {
            record_authentication("error", Some(kind));
        }
    }

    #[test]
    fn test_record_key_set_fetch() {
        record_key_set_fetch("success");
        record_key_set_fetch("error");
    }

    #[test]
    fn test_record_key_cache_lookup() {
        for cache_status in ["hit", "refreshed", "stale", "miss"] {
            record_key_cache_lookup(cache_status);
        }
    }
}
