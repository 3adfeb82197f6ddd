//! Error types for sessiongate
//!
//! Every failure on the request path is classified into an `AppError`,
//! which implements `IntoResponse`. This is the only place where an error
//! kind becomes an HTTP status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Response bodies only ever carry the canonical reason phrase of the
/// status code. Details (crypto, serde, store messages) are logged.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input: JSON body, token decoding, session payload (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication failed: missing cookie, bad credentials (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Session has expired (401)
    #[error("Session expired")]
    Expired,

    /// Request body over the configured limit (413)
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Wrong HTTP method (405)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status and metric label for this error
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Expired => (StatusCode::UNAUTHORIZED, "expired"),
            AppError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    /// Status code this error is reported with
    pub fn status(&self) -> StatusCode {
        self.classify().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.classify();

        match &self {
            AppError::Internal(error) => {
                tracing::error!(error = %error, "Request failed with internal error");
            }
            AppError::Config(message) => {
                tracing::error!(error = %message, "Request failed with configuration error");
            }
            AppError::BadRequest(detail) => {
                tracing::debug!(detail = %detail, "Rejected malformed request");
            }
            _ => {}
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
