//! JSON response envelopes shared by every gateway-generated response

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Success envelope: `{"message": ..., "data": ...}` with `data` omitted when absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T = serde_json::Value> {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> SuccessResponse<T> {
    pub fn new(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Error envelope: `{"error": <code>, "message": ...}`
///
/// `data` is only populated by the health endpoint, which reports the
/// per-backend map alongside `PARTIAL_OUTAGE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse<T = serde_json::Value> {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T> ErrorResponse<T> {
    pub fn with_data(code: impl Into<String>, message: impl Into<String>, data: T) -> Self {
        Self {
            error: code.into(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Render a success envelope with the given status
pub fn success<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> Response {
    (status, Json(SuccessResponse::new(message, data))).into_response()
}
