//! Error types for the feed engine
//!
//! Errors are converted to HTTP responses at the handler boundary.
//! Validation problems surface as 4xx and are never retried; collaborator
//! failures mostly degrade inside the services and only reach this type
//! when the primary content store read fails outright.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

/// Result type for feed-engine operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input: bad cursor, bad enum value, missing/invalid ID
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing user identity at the boundary
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    /// Primary content store read failed; the only collaborator failure
    /// that is allowed to surface as a 5xx
    #[error("Content store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            AppError::BadRequest(_) => "validation_error",
            AppError::Unauthorized(_) => "authentication_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::RateLimited => "rate_limit_error",
            AppError::StoreUnavailable(_) | AppError::Internal(_) => "server_error",
        };

        HttpResponse::build(status).json(json!({
            "error": error_type,
            "message": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

impl From<crate::stores::StoreError> for AppError {
    fn from(err: crate::stores::StoreError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let err = AppError::BadRequest("bad cursor".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_failure_maps_to_500() {
        let err = AppError::StoreUnavailable("timeout".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
