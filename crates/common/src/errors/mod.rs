//! Error types for Concierge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Storage errors (7xxx)
    IndexError,
    DocumentError,

    // External service errors (8xxx)
    EmbeddingError,
    LlmError,
    CalendarError,

    // Internal errors (9xxx)
    InternalError,
    AgentError,
    ConfigurationError,
    SerializationError,
    RequestTimeout,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,

            ErrorCode::NotFound => 4001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::IndexError => 7001,
            ErrorCode::DocumentError => 7002,

            ErrorCode::EmbeddingError => 8002,
            ErrorCode::LlmError => 8003,
            ErrorCode::CalendarError => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::AgentError => 9002,
            ErrorCode::ConfigurationError => 9003,
            ErrorCode::SerializationError => 9004,
            ErrorCode::RequestTimeout => 9005,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Storage errors
    #[error("Vector index error: {message}")]
    Index { message: String },

    #[error("Document error for {path}: {message}")]
    Document { path: String, message: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("LLM error: {message}")]
    Llm { message: String },

    #[error("create_event failed: {message}")]
    Calendar { message: String },

    // Internal errors
    #[error("{message}")]
    Agent { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request timed out")]
    RequestTimeout,
}

impl AppError {
    /// Shorthand for a validation failure without a specific field
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Index { .. } => ErrorCode::IndexError,
            AppError::Document { .. } => ErrorCode::DocumentError,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::Llm { .. } => ErrorCode::LlmError,
            AppError::Calendar { .. } => ErrorCode::CalendarError,
            AppError::Agent { .. } => ErrorCode::AgentError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::RequestTimeout => ErrorCode::RequestTimeout,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 408 Request Timeout
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Index { .. }
            | AppError::Document { .. }
            | AppError::Calendar { .. }
            | AppError::Agent { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. } | AppError::Llm { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Error body returned by the API.
///
/// `error` stays a plain string so callers can display it directly.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NotFound {
            resource_type: "index".into(),
            id: "vector_index".into(),
        };
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code().as_code(), 4001);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "No message provided".into(),
            field: Some("message".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No message provided");
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_calendar_error_message() {
        let err = AppError::Calendar {
            message: "token expired".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "create_event failed: token expired");
    }

    #[test]
    fn test_upstream_errors_are_bad_gateway() {
        let err = AppError::Llm {
            message: "connection refused".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_server_error());
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = AppError::validation("Missing information").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Missing information");
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
