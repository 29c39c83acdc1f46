//! # Error Handling
//!
//! Custom error types for HTTP-facing failures and their conversion to
//! JSON error responses.
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "session_limit",
//!     "message": "Session limit of 10 reached",
//!     "timestamp": "2026-01-01T12:00:00Z"
//!   }
//! }
//! ```
//!
//! Note that WebSocket protocol faults never surface here: once a
//! connection is upgraded, faults travel as in-band `error` messages and
//! the session stays up. AppError covers everything before the upgrade
//! and the plain HTTP endpoints.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// HTTP-facing application errors.
#[derive(Debug)]
pub enum AppError {
    /// Server-side problems (500)
    Internal(String),

    /// Configuration file or environment variable problems (500)
    ConfigError(String),

    /// The concurrent voice session cap is reached (503)
    SessionLimit(usize),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SessionLimit(max) => {
                write!(f, "Session limit of {} reached", max)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type) = match self {
            AppError::Internal(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
            AppError::ConfigError(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
            ),
            AppError::SessionLimit(_) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "session_limit",
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_limit_maps_to_service_unavailable() {
        let err = AppError::SessionLimit(10);
        let response = err.error_response();
        assert_eq!(response.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Session limit of 10 reached");
    }

    #[test]
    fn internal_maps_to_500() {
        let response = AppError::Internal("boom".to_string()).error_response();
        assert_eq!(
            response.status(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
