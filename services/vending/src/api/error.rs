//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every vending endpoint
//! returns the same error shape.
//!
//! # Key invariants and assumptions
//! - Error responses carry a stable `code` and a human-readable `message`.
//! - Identity failures map to 401, authorization failures to 403, remote
//!   authority failures to 503 and vendor misconfiguration to 500.
//!
//! # Security considerations
//! - Remote and internal failures are logged server-side; clients only get a
//!   generic message.
//! - Credentials never appear in error bodies.
use crate::api::types::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use warden_vendor::{FailureClass, VendError};

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

/// Build a 404 error for a vending variant this instance does not serve.
pub fn api_not_enabled(message: &str) -> ApiError {
    // Use NOT_FOUND to avoid exposing disabled feature presence.
    api_error(StatusCode::NOT_FOUND, "not_enabled", message)
}

/// Build a 401 Unauthorized error.
pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

/// Build a 403 Forbidden error.
pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

/// Build a 503 Service Unavailable error.
pub fn api_unavailable(message: &str) -> ApiError {
    api_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
}

/// Build a 500 Internal Server Error.
pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<VendError> for ApiError {
    fn from(err: VendError) -> Self {
        match err.failure() {
            FailureClass::IdentityNotEstablished => api_unauthorized(&err.to_string()),
            FailureClass::AccessDenied => api_forbidden(&err.to_string()),
            FailureClass::ServiceUnavailable => {
                tracing::error!(error = %err, "credential authority unavailable");
                api_unavailable("credential authority unavailable")
            }
            FailureClass::Misconfigured => {
                tracing::error!(error = %err, "vendor misconfigured");
                api_internal_message("policy could not be assembled")
            }
        }
    }
}
