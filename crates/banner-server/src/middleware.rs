use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use banner_api::ApiError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the raw token; `Authorization: Bearer` is accepted too.
pub const TOKEN_HEADER: &str = "token";

// =============================================================================
// Authentication
// =============================================================================

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// The verified caller, stored in request extensions by [`authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub is_admin: bool,
}

/// Token verification settings shared by every request.
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    key: DecodingKey,
    validation: Validation,
}

impl AuthState {
    /// HMAC verification against `secret`. `exp` is checked only when present.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;
        validation.validate_aud = false;

        Self {
            inner: Arc::new(AuthInner {
                key: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            }),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Principal, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.inner.key, &self.inner.validation)?;
        Ok(Principal {
            user_id: data.claims.user_id,
            is_admin: data.claims.is_admin,
        })
    }
}

fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|h| h.to_str().ok())
        && !token.is_empty()
    {
        return Some(token);
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Verifies the request token and stores the [`Principal`] in extensions.
///
/// Missing or invalid tokens are rejected with 401.
pub async fn authenticate(
    State(auth): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(req.headers()) else {
        tracing::debug!(path = %req.uri().path(), "No auth token");
        return ApiError::unauthorized().into_response();
    };

    match auth.verify(token) {
        Ok(principal) => {
            tracing::debug!(
                user_id = principal.user_id,
                is_admin = principal.is_admin,
                "Token validated"
            );
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Token validation failed");
            ApiError::unauthorized().into_response()
        }
    }
}

/// Rejects non-admin callers with 403. Must run after [`authenticate`].
pub async fn require_admin(req: Request<Body>, next: Next) -> Response {
    match req.extensions().get::<Principal>() {
        Some(principal) if principal.is_admin => next.run(req).await,
        Some(principal) => {
            tracing::debug!(user_id = principal.user_id, "Admin access denied");
            ApiError::forbidden().into_response()
        }
        None => {
            tracing::error!("require_admin ran without an authenticated principal");
            ApiError::unauthorized().into_response()
        }
    }
}

// =============================================================================
// Request ID
// =============================================================================

pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // Keep the caller's id when present.
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        });

    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}
