//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Expected business-rule violations are typed variants carrying a
/// user-facing message; they are never raised as panics. Encryption and
/// persistence failures indicate corruption or misconfiguration and map to
/// 5xx responses with details hidden from the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Wraps any sqlx::Error via `#[from]`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Key wrap/unwrap or field encrypt/decrypt failed.
    ///
    /// A mismatched master key, malformed ciphertext or truncated key
    /// material is fatal for the operation: it means stored data and
    /// configuration disagree, not that the caller did something wrong.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// No valid bearer token was presented.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Authentication required")]
    Unauthorized,

    /// The authenticated caller's role does not permit this operation.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Operation not permitted: {0}")]
    Forbidden(&'static str),

    /// Referenced entity does not exist or is soft-deleted.
    ///
    /// Returns HTTP 404 Not Found. The payload names the entity kind
    /// (car, device, booking, ...).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Business-rule violation (device not available, association already
    /// exists, booking not in the expected state, ...).
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An outbound call to a collaborator (mail provider, image store)
    /// failed.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("External service error: {0}")]
    ExternalService(String),
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Clients can rely on the status category to decide retry vs.
/// surface-to-user.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::ExternalService(_) => (
                StatusCode::BAD_GATEWAY,
                "external_service_error",
                "An upstream service failed".to_string(),
            ),
            // Hide persistence and crypto details from clients
            AppError::Database(_) | AppError::Crypto(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
