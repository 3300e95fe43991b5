//! Gate Service error types.
//!
//! Authentication failures are classified into kinds for logs and metrics,
//! but every kind renders as the same generic 401 response. Distinct
//! responses per failure mode would tell an attacker which stage of the
//! pipeline rejected a forged token.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::TokenError;
use serde::Serialize;
use thiserror::Error;

/// Authentication failure kinds.
///
/// The `Display` messages are internal detail for server-side logs. Clients
/// only ever see the generic body produced by the `IntoResponse` impl.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header absent or empty")]
    MissingCredential,

    #[error("credential is not a well-formed bearer token")]
    MalformedCredential,

    #[error("token algorithm is outside the accepted set")]
    UnsupportedAlgorithm,

    #[error("no verification key available for this token")]
    KeyResolutionFailure,

    #[error("signature or claims rejected")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("verified token carries no usable identity claim")]
    ClaimMissing,
}

impl AuthError {
    /// Stable snake_case label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::KeyResolutionFailure => "key_resolution_failure",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::Expired => "expired",
            AuthError::ClaimMissing => "claim_missing",
        }
    }

    /// HTTP status for this error. Every kind maps to 401; the kinds exist
    /// for observability, not for the wire.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::TokenTooLarge
            | TokenError::MalformedToken
            | TokenError::MissingKeyId => AuthError::MalformedCredential,
            TokenError::UnsupportedAlgorithm => AuthError::UnsupportedAlgorithm,
            TokenError::Expired => AuthError::Expired,
            // A token that is not yet valid is structurally sound but fails
            // claims validation, same bucket as a bad signature
            TokenError::NotYetValid => AuthError::SignatureInvalid,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Kind goes to logs only; the wire carries one generic body
        tracing::debug!(target: "gate.errors", kind = self.kind(), "Authentication failed");

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: "AUTHENTICATION_FAILED".to_string(),
                message: "Authentication failed".to_string(),
            },
        };

        let mut response =
            (StatusCode::UNAUTHORIZED, Json(error_response)).into_response();

        if let Ok(header_value) =
            "Bearer realm=\"watchtower-api\", error=\"invalid_token\"".parse()
        {
            response
                .headers_mut()
                .insert("WWW-Authenticate", header_value);
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn all_kinds() -> Vec<AuthError> {
        vec![
            AuthError::MissingCredential,
            AuthError::MalformedCredential,
            AuthError::UnsupportedAlgorithm,
            AuthError::KeyResolutionFailure,
            AuthError::SignatureInvalid,
            AuthError::Expired,
            AuthError::ClaimMissing,
        ]
    }

    #[test]
    fn test_display_missing_credential() {
        let error = AuthError::MissingCredential;
        assert_eq!(format!("{}", error), "Authorization header absent or empty");
    }

    #[test]
    fn test_display_expired() {
        let error = AuthError::Expired;
        assert_eq!(format!("{}", error), "token has expired");
    }

    #[test]
    fn test_kind_labels_are_stable() {
        assert_eq!(AuthError::MissingCredential.kind(), "missing_credential");
        assert_eq!(AuthError::MalformedCredential.kind(), "malformed_credential");
        assert_eq!(
            AuthError::UnsupportedAlgorithm.kind(),
            "unsupported_algorithm"
        );
        assert_eq!(
            AuthError::KeyResolutionFailure.kind(),
            "key_resolution_failure"
        );
        assert_eq!(AuthError::SignatureInvalid.kind(), "signature_invalid");
        assert_eq!(AuthError::Expired.kind(), "expired");
        assert_eq!(AuthError::ClaimMissing.kind(), "claim_missing");
    }

    #[test]
    fn test_every_kind_is_unauthorized() {
        for error in all_kinds() {
            assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_from_token_error_structural_failures() {
        assert_eq!(
            AuthError::from(TokenError::TokenTooLarge),
            AuthError::MalformedCredential
        );
        assert_eq!(
            AuthError::from(TokenError::MalformedToken),
            AuthError::MalformedCredential
        );
        assert_eq!(
            AuthError::from(TokenError::MissingKeyId),
            AuthError::MalformedCredential
        );
    }

    #[test]
    fn test_from_token_error_algorithm_and_time() {
        assert_eq!(
            AuthError::from(TokenError::UnsupportedAlgorithm),
            AuthError::UnsupportedAlgorithm
        );
        assert_eq!(AuthError::from(TokenError::Expired), AuthError::Expired);
        assert_eq!(
            AuthError::from(TokenError::NotYetValid),
            AuthError::SignatureInvalid
        );
    }

    #[tokio::test]
    async fn test_into_response_identical_for_every_kind() {
        let mut bodies = Vec::new();

        for error in all_kinds() {
            let response = error.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let www_auth = response
                .headers()
                .get("WWW-Authenticate")
                .expect("401 must carry WWW-Authenticate")
                .to_str()
                .unwrap()
                .to_string();
            assert!(www_auth.contains("Bearer realm=\"watchtower-api\""));

            bodies.push(read_body_json(response.into_body()).await);
        }

        let (first, rest) = bodies.split_first().expect("at least one kind");
        for body in rest {
            assert_eq!(body, first);
        }
        assert_eq!(first["error"]["code"], "AUTHENTICATION_FAILED");
        assert_eq!(first["error"]["message"], "Authentication failed");
    }

    #[tokio::test]
    async fn test_internal_messages_never_reach_the_body() {
        for error in all_kinds() {
            let internal = format!("{}", error);
            let response = error.into_response();
            let body = read_body_json(response.into_body()).await;
            let rendered = body.to_string();

            assert!(
                !rendered.contains(&internal),
                "internal message '{}' leaked into response body",
                internal
            );
        }
    }
}
