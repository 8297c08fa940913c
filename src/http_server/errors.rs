//! # HTTP API Errors
//!
//! Errors raised before a stream starts. Once the response head has been
//! sent, failures can only truncate the body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::source::SourceError;

/// Result type for request handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Malformed or incomplete request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Batch size of zero or above the configured maximum
    #[error("Batch size {requested} is out of range (1..={max})")]
    InvalidBatchSize { requested: usize, max: usize },

    /// Limit exceeds maximum
    #[error("Limit {0} exceeds maximum {1}")]
    LimitExceeded(u64, u64),

    // ==================
    // Row Source Errors
    // ==================
    /// Opening the cursor failed
    #[error("{0}")]
    Source(#[from] SourceError),

    // ==================
    // Server Errors (5xx)
    // ==================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidBatchSize { .. } => StatusCode::BAD_REQUEST,
            ApiError::LimitExceeded(_, _) => StatusCode::BAD_REQUEST,

            ApiError::Source(SourceError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            ApiError::Source(SourceError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Source(_) => StatusCode::INTERNAL_SERVER_ERROR,

            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        Self {
            code: err.status_code().as_u16(),
            error: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::from(self));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::InvalidRequest("empty".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::LimitExceeded(10, 5).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("x".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_source_error_mapping() {
        let invalid = ApiError::from(SourceError::InvalidQuery("syntax".to_string()));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let busy = ApiError::from(SourceError::Unavailable("no file".to_string()));
        assert_eq!(busy.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let failed = ApiError::from(SourceError::Execution("boom".to_string()));
        assert_eq!(failed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_response_body() {
        let body = ErrorResponse::from(ApiError::InvalidBatchSize {
            requested: 0,
            max: 100,
        });
        assert_eq!(body.code, 400);
        assert_eq!(body.error, "Batch size 0 is out of range (1..=100)");
    }
}
