//! Claims and identity types for verified tokens.

use serde::Deserialize;
use std::fmt;

/// Claims decoded from a verified token.
///
/// Only the fields the pipeline consults are named. Everything else the
/// token carries is preserved exactly as decoded in `extra`, so enriching
/// a token upstream never requires a change here.
#[derive(Clone, Deserialize)]
pub struct Claims {
    /// Standard subject claim, first identity candidate.
    #[serde(default)]
    pub sub: Option<String>,

    /// Legacy identity claim, second candidate.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Legacy identity claim, third candidate.
    #[serde(default)]
    pub id: Option<String>,

    /// Expiry as Unix seconds. A token without `exp` never verifies.
    pub exp: i64,

    /// Not-before as Unix seconds.
    #[serde(default)]
    pub nbf: Option<i64>,

    /// Remaining claims, untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// Manual Debug: identity claims and the extra map may carry PII
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id.as_ref().map(|_| "[REDACTED]"))
            .field("id", &self.id.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("extra", &"[REDACTED]")
            .finish()
    }
}

impl Claims {
    /// First non-empty identity claim in precedence order: `sub`, then
    /// `user_id`, then `id`. The winning value is returned exactly as it
    /// appeared in the token.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        [
            self.sub.as_deref(),
            self.user_id.as_deref(),
            self.id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
    }
}

/// Verified caller identity produced by a successful authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Subject string copied exactly from the winning identity claim.
    pub subject: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &"[REDACTED]")
            .finish()
    }
}
