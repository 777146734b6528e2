//! Error types for lingua-ab
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. HTTP handlers convert these into status codes through
//! [`IntoResponse`].

use crate::alignment::AlignmentError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for lingua-ab
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Errors surfaced by the shared library
    #[error(transparent)]
    Common(#[from] lingua_common::Error),

    /// Alignment data missing or unusable
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    /// JSON encode/decode errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Request lacks a usable profile identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using lingua-ab Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Alignment(AlignmentError::Malformed(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Alignment(AlignmentError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Alignment(AlignmentError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "status": "error", "message": self.to_string() }))).into_response()
    }
}
