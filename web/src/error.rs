//! Error types for web handlers.
//!
//! Bridges between pipeline errors and HTTP responses by implementing
//! Axum's `IntoResponse`. Publish handlers acknowledge acceptance onto the
//! transport, so the only failures they surface are malformed requests and
//! broker unavailability.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fleetline_core::MessageBusError;
use serde::Serialize;

/// Application error type for web handlers.
///
/// Wraps the failure with an HTTP status, a user-facing message, and a
/// stable error code for client handling. The internal source error is
/// logged, never exposed.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach a source error for logging.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }

    /// The HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(source) = &self.source {
            tracing::error!(
                status = %self.status,
                code = %self.code,
                error = %source,
                "Request failed"
            );
        } else if self.status.is_server_error() {
            tracing::error!(status = %self.status, code = %self.code, message = %self.message, "Request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<MessageBusError> for AppError {
    fn from(error: MessageBusError) -> Self {
        match &error {
            MessageBusError::PublishFailed { topic, .. } => Self::unavailable(format!(
                "Message could not be accepted onto topic '{topic}'"
            ))
            .with_source(error.into()),
            _ => Self::unavailable("Message bus unavailable").with_source(error.into()),
        }
    }
}
