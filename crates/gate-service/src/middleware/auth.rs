//! Authentication middleware for protected routes.
//!
//! Runs the [`Authenticator`] pipeline on the `Authorization` header and
//! injects the verified [`Identity`] into request extensions for handlers.
//! Every rejection renders as the same generic 401.

use crate::auth::claims::Identity;
use crate::auth::jwt::Authenticator;
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Shared authentication pipeline.
    pub authenticator: Arc<Authenticator>,
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 Unauthorized (single generic body) when the credential is missing
///   or rejected for any reason
/// - Continues to the next handler with [`Identity`] in request extensions
///   on success
///
/// # Errors
///
/// Returns [`AuthError`] on rejection; axum renders it via `IntoResponse`.
#[instrument(skip_all, name = "gate.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let header_value = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::debug!(
                    target: "gate.middleware.auth",
                    "Authorization header is not valid UTF-8"
                );
                return Err(AuthError::MalformedCredential);
            }
        },
    };

    let identity = state.authenticator.authenticate(header_value).await?;

    // Store identity in request extensions for downstream handlers
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Extension trait for reading the verified identity off a request.
pub trait IdentityExt {
    /// The authenticated identity, or `None` if the auth middleware was not
    /// applied to this request.
    fn identity(&self) -> Option<&Identity>;
}

impl<B> IdentityExt for axum::http::Request<B> {
    fn identity(&self) -> Option<&Identity> {
        self.extensions().get::<Identity>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use axum::{middleware, Extension, Router};
    use chrono::Utc;
    use common::secret::SecretString;
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "middleware-test-secret";

    fn hs256_token(claims: &serde_json::Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    async fn subject_handler(Extension(identity): Extension<Identity>) -> String {
        identity.subject
    }

    fn test_app() -> Router {
        let state = Arc::new(AuthState {
            authenticator: Arc::new(Authenticator::new(
                Some(SecretString::from(TEST_SECRET.to_string())),
                None,
            )),
        });
        Router::new()
            .route("/protected", get(subject_handler))
            .layer(middleware::from_fn_with_state(state, require_auth))
    }

    fn assert_clone<T: Clone>() {}

    #[test]
    fn test_auth_state_is_clone() {
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_identity_ext_none_without_middleware() {
        let req = axum::http::Request::builder()
            .uri("/api/profile")
            .body(Body::empty())
            .unwrap();

        assert!(req.identity().is_none());
    }

    #[test]
    fn test_identity_ext_reads_inserted_identity() {
        let mut req = axum::http::Request::builder()
            .uri("/api/profile")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(Identity {
            subject: "user-1".to_string(),
        });

        assert_eq!(
            req.identity().map(|i| i.subject.as_str()),
            Some("user-1")
        );
    }

    #[tokio::test]
    async fn test_require_auth_passes_valid_token_through() {
        let app = test_app();
        let token = hs256_token(&json!({"sub": "user-1", "exp": Utc::now().timestamp() + 3600}));
        let request = axum::http::Request::builder()
            .uri("/protected")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The handler saw the identity the middleware stored
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "user-1");
    }

    #[tokio::test]
    async fn test_require_auth_rejects_missing_header() {
        let app = test_app();
        let request = axum::http::Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");
    }

    #[tokio::test]
    async fn test_require_auth_rejects_wrong_scheme() {
        let app = test_app();
        let request = axum::http::Request::builder()
            .uri("/protected")
            .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_auth_rejects_non_utf8_header() {
        let app = test_app();
        let value = HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap();
        let request = axum::http::Request::builder()
            .uri("/protected")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
