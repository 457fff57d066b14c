//! API error type and HTTP mapping
//!
//! Every violated invariant maps to a precise status code and
//! machine-readable error code; infrastructure faults are the only 500s.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// State-machine precondition violated (409)
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Externally supplied AI score outside {0, 3, 6, 10} (422)
    #[error("Invalid score: {0}")]
    InvalidScore(String),

    /// Uniqueness violation on enrollment or submission identity (409)
    #[error("Duplicate enrollment: {0}")]
    DuplicateEnrollment(String),

    /// Resource missing or outside the caller's tenant scope (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Role or tenant mismatch (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing or invalid bearer token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// evp-common error
    #[error("Common error: {0}")]
    Common(#[from] evp_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::InvalidStateTransition(msg) => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION", msg)
            }
            ApiError::InvalidScore(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_SCORE", msg)
            }
            ApiError::DuplicateEnrollment(msg) => {
                (StatusCode::CONFLICT, "DUPLICATE_ENROLLMENT", msg)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Database(ref err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    err.to_string(),
                )
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl ApiError {
    /// Map a sqlx error to DuplicateEnrollment when it is a uniqueness
    /// violation on the given identity, otherwise pass it through.
    pub fn from_insert(err: sqlx::Error, identity: &str) -> ApiError {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::DuplicateEnrollment(identity.to_string())
            }
            _ => ApiError::Database(err),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
