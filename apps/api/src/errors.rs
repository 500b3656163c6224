use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Version conflict: {0}")]
    Conflict(String),

    /// A version chain that should resolve doesn't: a null or dangling
    /// current pointer, a missing cross-reference, an empty chain on an edit
    /// path. The store holds inconsistent data; nothing is repaired here.
    #[error("Version chain integrity error: {0}")]
    BrokenChain(String),

    /// A multi-step operation failed after some writes committed. The
    /// message names what was committed so the state can be repaired by hand.
    #[error("Operation partially completed: {0}")]
    Incomplete(String),

    #[error("Record store error: {0}")]
    Store(StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::AuthRejected => AppError::Unauthorized,
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "VERSION_CONFLICT", msg.clone()),
            AppError::BrokenChain(msg) => {
                tracing::error!("Version chain integrity error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATA_INTEGRITY",
                    msg.clone(),
                )
            }
            AppError::Incomplete(msg) => {
                tracing::error!("Partial completion: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PARTIAL_COMPLETION",
                    msg.clone(),
                )
            }
            AppError::Store(e) => {
                tracing::error!("Record store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "The operation failed against the backing store".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
