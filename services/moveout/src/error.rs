//! Custom error types for the MoveOut service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for the MoveOut API
///
/// Validation and auth failures are detected before any write; upstream
/// failures are logged with detail at the call site and surface here only
/// as generic 500s.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate resource
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad credentials or unusable account
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Missing bearer token or insufficient role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// A single-field transition did not hold on re-read
    #[error("State error: {0}")]
    State(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Auth(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::State(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(ApiError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Conflict("dup".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Auth("nope".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Forbidden("no token".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ApiError::NotFound("label".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::State("mismatch".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::InternalServerError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
