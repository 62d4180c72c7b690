//! Error types for CiteForge services
//!
//! Provides a single error enum for the whole workspace with:
//! - A machine-readable error kind (the `kind` field reported to tool callers)
//! - HTTP status code mapping
//! - Structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error kinds reported to tool callers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Caller errors (1xxx)
    InvalidArgument,
    PaperNotFound,
    RateLimited,

    // Upstream errors (8xxx)
    ProviderUnavailable,
    Timeout,

    // Internal errors (9xxx)
    ConfigurationError,
    SerializationError,
    InternalError,
}

impl ErrorKind {
    /// Get the numeric code for this kind
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidArgument => 1001,
            ErrorKind::PaperNotFound => 1002,
            ErrorKind::RateLimited => 1003,

            ErrorKind::ProviderUnavailable => 8001,
            ErrorKind::Timeout => 8002,

            ErrorKind::ConfigurationError => 9001,
            ErrorKind::SerializationError => 9002,
            ErrorKind::InternalError => 9003,
        }
    }

    /// Stable name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::PaperNotFound => "PaperNotFound",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::SerializationError => "SerializationError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
        field: Option<String>,
    },

    #[error("Paper not found: {id}")]
    PaperNotFound { id: String },

    #[error("Provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("Deadline of {timeout_ms}ms exceeded")]
    Timeout { timeout_ms: u64 },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("Provider request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Shorthand for an `InvalidArgument` error tied to a request field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            AppError::PaperNotFound { .. } => ErrorKind::PaperNotFound,
            AppError::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            AppError::Timeout { .. } => ErrorKind::Timeout,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            // Upstream transport failures, including per-request timeouts,
            // are provider failures; `Timeout` is reserved for caller deadlines
            AppError::HttpClient(_) => ErrorKind::ProviderUnavailable,
            AppError::Configuration { .. } => ErrorKind::ConfigurationError,
            AppError::Serialization(_) => ErrorKind::SerializationError,
            AppError::Internal { .. } => ErrorKind::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::PaperNotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ConfigurationError
            | ErrorKind::SerializationError
            | ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
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

    fn field(&self) -> Option<String> {
        match self {
            AppError::InvalidArgument { field, .. } => field.clone(),
            _ => None,
        }
    }
}

/// Structured error response for tool callers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub kind: ErrorKind,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let kind = err.kind();
        ErrorResponse {
            success: false,
            error: ErrorDetails {
                kind,
                code: kind.as_code(),
                message: err.to_string(),
                field: err.field(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from(&self);

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %body.error.message,
                kind = body.error.kind.as_str(),
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %body.error.message,
                kind = body.error.kind.as_str(),
                status = status.as_u16(),
                "Client error"
            );
        }

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
