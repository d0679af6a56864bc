//! Common error types for the gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::response::ErrorResponse;

/// Application-wide error type
///
/// Every failure that can reach a caller is one of these variants. The HTTP
/// status and machine code are derived from the variant, never from the
/// rendered message.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authorization header is required")]
    MissingToken,

    #[error("Token rejected by identity service: {code}: {message}")]
    InvalidToken { code: String, message: String },

    #[error("Token validation transport failure: {0}")]
    ValidationTransport(String),

    #[error("Circuit breaker for '{0}' is open")]
    CircuitOpen(String),

    #[error("Failed to build proxy request: {0}")]
    ProxyConstruction(String),

    #[error("Backend '{backend}' unavailable: {message}")]
    UpstreamUnavailable { backend: String, message: String },

    #[error("Backend '{backend}' returned {status}")]
    UpstreamServerError { backend: String, status: StatusCode },

    #[error("Backend not found: {0}")]
    BackendNotFound(String),

    #[error("Endpoint not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Token rejection with the generic code and message
    pub fn invalid_token() -> Self {
        Self::InvalidToken {
            code: "INVALID_TOKEN".to_string(),
            message: "Invalid or expired token".to_string(),
        }
    }

    /// HTTP status returned to the caller
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MissingToken | AppError::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            AppError::ValidationTransport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ProxyConstruction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AppError::UpstreamServerError { status, .. } => *status,
            AppError::BackendNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code placed in the `error` field of the envelope
    pub fn code(&self) -> &str {
        match self {
            AppError::Config(_) | AppError::Io(_) => "INTERNAL_ERROR",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::MissingToken => "MISSING_TOKEN",
            AppError::InvalidToken { code, .. } => code,
            AppError::ValidationTransport(_) => "VALIDATION_ERROR",
            AppError::CircuitOpen(_) => "CIRCUIT_BREAKER_OPEN",
            AppError::ProxyConstruction(_) => "PROXY_ERROR",
            AppError::UpstreamUnavailable { .. } => "SERVICE_UNAVAILABLE",
            AppError::UpstreamServerError { .. } => "SERVICE_ERROR",
            AppError::BackendNotFound(_) | AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::NotFound => "NOT_FOUND",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
        }
    }

    /// Human-readable message shown to the caller. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidRequest(_) => "Failed to read request body".to_string(),
            AppError::MissingToken => "Authorization header is required".to_string(),
            AppError::InvalidToken { message, .. } => message.clone(),
            AppError::ValidationTransport(_) => "Failed to validate token".to_string(),
            AppError::CircuitOpen(_) => {
                "Service is temporarily unavailable due to circuit breaker".to_string()
            }
            AppError::ProxyConstruction(_) => "Failed to create proxy request".to_string(),
            AppError::UpstreamUnavailable { .. } => "Target service is unavailable".to_string(),
            AppError::UpstreamServerError { .. } => "Target service returned an error".to_string(),
            AppError::NotFound => "Endpoint not found".to_string(),
            AppError::MethodNotAllowed => "Method not allowed".to_string(),
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::BackendNotFound(_)
            | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = Json(ErrorResponse::new(self.code(), self.public_message()));
        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
