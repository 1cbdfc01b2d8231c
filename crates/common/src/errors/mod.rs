//! Error types for SONAR deposit services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for workflow, file and backend failures
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
    PayloadTooLarge,
    UnknownStep,

    // Workflow errors (3xxx)
    DepositLocked,
    NotSubmittable,

    // Resource errors (4xxx)
    NotFound,
    DepositNotFound,
    FileNotFound,
    RecordNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamTimeout,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,
            ErrorCode::InvalidFormat => 1003,
            ErrorCode::PayloadTooLarge => 1004,
            ErrorCode::UnknownStep => 1006,

            // Workflow (3xxx)
            ErrorCode::DepositLocked => 3001,
            ErrorCode::NotSubmittable => 3002,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::DepositNotFound => 4002,
            ErrorCode::FileNotFound => 4003,
            ErrorCode::RecordNotFound => 4004,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamTimeout => 8002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Several form fields failed validation; the save is aborted as a whole.
    #[error("The form contains errors. Field(s) in error: {}", fields.join(", "))]
    InvalidFields { fields: Vec<String> },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Unknown deposit step: {step}")]
    UnknownStep { step: String },

    // Workflow errors
    #[error("Deposit {pid} cannot be edited in status {status}")]
    DepositLocked { pid: String, status: String },

    #[error("Deposit {pid} cannot be submitted: {reason}")]
    NotSubmittable { pid: String, reason: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Deposit not found: {pid}")]
    DepositNotFound { pid: String },

    #[error("File not found: {key}")]
    FileNotFound { key: String },

    #[error("Record not found: {record_type}/{pid}")]
    RecordNotFound { record_type: String, pid: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // External service errors
    #[error("Backend error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Backend timeout after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidFields { .. } => {
                ErrorCode::ValidationError
            }
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::UnknownStep { .. } => ErrorCode::UnknownStep,
            AppError::DepositLocked { .. } => ErrorCode::DepositLocked,
            AppError::NotSubmittable { .. } => ErrorCode::NotSubmittable,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DepositNotFound { .. } => ErrorCode::DepositNotFound,
            AppError::FileNotFound { .. } => ErrorCode::FileNotFound,
            AppError::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Upstream { .. } | AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidFields { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. }
            | AppError::UnknownStep { .. } => StatusCode::BAD_REQUEST,

            // 403 Forbidden
            AppError::DepositLocked { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::DepositNotFound { .. }
            | AppError::FileNotFound { .. }
            | AppError::RecordNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::NotSubmittable { .. } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Upstream { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
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

    /// Whether retrying the same backend call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::UpstreamTimeout { .. } => true,
            AppError::Upstream { status, .. } => *status >= 500,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Structured details attached to the JSON error body
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidFields { fields } => Some(serde_json::json!({ "fields": fields })),
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
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
            error: ErrorDetails {
                code,
                message,
                details: self.details(),
                request_id: None, // Should be filled by middleware
            },
        };

        (status, Json(body)).into_response()
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
        let err = AppError::DepositNotFound { pid: "42".into() };
        assert_eq!(err.code(), ErrorCode::DepositNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_fields_message() {
        let err = AppError::InvalidFields {
            fields: vec!["title".into(), "documentDate".into()],
        };
        assert_eq!(
            err.to_string(),
            "The form contains errors. Field(s) in error: title, documentDate"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_validation_field_details() {
        let err = AppError::Validation {
            message: "File a.pdf is listed more than once".into(),
            field: Some("keys".into()),
        };
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.details(), Some(serde_json::json!({ "field": "keys" })));
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Configuration {
            message: "Invalid backend URL".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_transient_upstream() {
        let err = AppError::Upstream {
            status: 503,
            message: "busy".into(),
        };
        assert!(err.is_transient());
        let err = AppError::Upstream {
            status: 404,
            message: "missing".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(ErrorCode::UpstreamError.as_code(), 8001);
    }
}
