//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the
//! same `{code, message, request_id}` body.
//!
//! # Where it fits
//! Handlers map their module errors (identity, federation, evaluation,
//! provisioning, store) onto these helpers. Codes map 1:1 onto the error
//! taxonomy clients switch on.
//!
//! # Key invariants and assumptions
//! - `code` is stable; `message` is for humans.
//! - Status codes must align with the error category.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
//! - Messages never echo tokens, secrets or signatures.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use controlplane::api::error::api_access_denied;
///
/// let err = api_access_denied("policy does not cover feature");
/// assert_eq!(err.status, StatusCode::FORBIDDEN);
/// assert_eq!(err.body.code, "access_denied");
/// ```
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

/// Identity pool missing, region mismatch, or unauthenticated identities disabled.
pub fn api_identity_service_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "identity_service_error", message)
}

/// Identity unknown/expired, or a web identity token that failed verification.
pub fn api_token_issuance_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "token_issuance_error", message)
}

pub fn api_trust_policy_mismatch(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "trust_policy_mismatch", message)
}

pub fn api_access_denied(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "access_denied", message)
}

/// Project or feature does not exist.
pub fn api_evaluation_error(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "evaluation_error", message)
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub fn api_conflict(message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, "conflict", message)
}

/// Build a 400 Bad Request validation error.
pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Build a 500 Internal Server Error from a store error.
///
/// Logs the store error and returns a generic internal error response.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "guestflag storage error");
    api_internal_message(message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}
