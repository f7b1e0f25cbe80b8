//! Application error type mapping to HTTP status codes.
//!
//! Body: `{"code": "...", "message": "..."}`. Server-side failures return a
//! generic message; the detail is logged instead.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tinker_types::error::{RepositoryError, TurnError};
use tinker_types::llm::LlmError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or oversized input. Not retryable.
    Validation(String),
    /// Message log failure.
    Storage(RepositoryError),
    /// Upstream completion failure or timeout.
    Provider(LlmError),
    /// Generic internal error.
    Internal(String),
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Validation(msg) => AppError::Validation(msg),
            TurnError::Storage(e) => AppError::Storage(e),
            TurnError::Provider(e) => AppError::Provider(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::Validation(format!("Request body too large: {}", rejection.body_text()))
        } else {
            AppError::Validation(format!("Invalid input: {}", rejection.body_text()))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
            AppError::Provider(e) => {
                tracing::error!(error = %e, "Provider failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PROVIDER_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}
