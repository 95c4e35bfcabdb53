//! Relay error type mapping to HTTP status codes and the `{ "error": ... }`
//! body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use mistral_relay::RelayError;

pub const MESSAGES_REQUIRED: &str = "Messages are required and must be an array";

/// Error returned by relay handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request body.
    #[error("{0}")]
    BadRequest(String),
    /// No API key was configured at startup.
    #[error("Mistral API key not configured")]
    MissingApiKey,
    /// Non-success status returned by Mistral, mirrored to the caller.
    #[error("Mistral API error: {message}")]
    Upstream { status: u16, message: String },
    /// Mistral could not be reached or answered with an unusable body.
    #[error("{0}")]
    BadGateway(String),
    /// Generic internal error; the detail is logged, not returned.
    #[error("Internal server error")]
    Internal(String),
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Configuration(msg) => ApiError::BadRequest(msg),
            RelayError::Upstream { status, message } => ApiError::Upstream { status, message },
            RelayError::Transport(msg) => {
                ApiError::BadGateway(format!("Failed to reach Mistral API: {msg}"))
            }
            RelayError::Protocol(msg) => {
                ApiError::BadGateway(format!("Invalid response from Mistral API: {msg}"))
            }
            RelayError::Cancelled => ApiError::Internal("request cancelled".to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(detail) => error!(detail = %detail, "chat relay internal error"),
            ApiError::BadGateway(detail) => error!(detail = %detail, "chat relay upstream unreachable"),
            _ => {}
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
