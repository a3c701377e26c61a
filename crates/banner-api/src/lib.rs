//! HTTP-facing error and body types for the banner service.
//!
//! Every error leaves the service as `{"error": "<message>"}` with the status
//! given by [`ApiError::status_code`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use banner_core::ValidationError;
use banner_storage::{ErrorCategory, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MSG_BANNER_NOT_FOUND: &str = "banner not found";
pub const MSG_BANNER_EXISTS: &str = "banner with such feature and tag already exists";
pub const MSG_INVALID_TOKEN: &str = "invalid auth token";
pub const MSG_ADMIN_REQUIRED: &str = "admin privileges required";
pub const MSG_INTERNAL: &str = "internal server error";

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body of a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBanner {
    pub banner_id: i64,
}

/// High-level API errors mapped to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The message is logged, never sent to the client.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn unauthorized() -> Self {
        Self::Unauthorized(MSG_INVALID_TOKEN.into())
    }
    pub fn forbidden() -> Self {
        Self::Forbidden(MSG_ADMIN_REQUIRED.into())
    }
    pub fn not_found() -> Self {
        Self::NotFound(MSG_BANNER_NOT_FOUND.into())
    }
    pub fn conflict() -> Self {
        Self::Conflict(MSG_BANNER_EXISTS.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message a client sees.
    pub fn public_message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg,
            ApiError::Internal(_) => MSG_INTERNAL,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err.category() {
            ErrorCategory::NotFound => ApiError::not_found(),
            ErrorCategory::Conflict => ApiError::conflict(),
            ErrorCategory::Transaction
            | ErrorCategory::Infrastructure
            | ErrorCategory::Internal => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        let body = ErrorBody::new(self.public_message());
        (status, Json(body)).into_response()
    }
}
