//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Page rendering failed.
    #[error("Render error: {0}")]
    Render(String),

    /// The upstream could not be reached or answered badly.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Session handling failed.
    #[error("Session error: {0}")]
    Session(#[from] authgate_session::SessionError),

    /// Identity provider failure.
    #[error("Provider error: {0}")]
    Provider(#[from] authgate_oauth::ProviderError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<authgate_config::ConfigError> for ServerError {
    fn from(e: authgate_config::ConfigError) -> Self {
        ServerError::Config(e.to_string())
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            ServerError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ServerError::Session(_) => (StatusCode::INTERNAL_SERVER_ERROR, "session_error"),
            ServerError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
