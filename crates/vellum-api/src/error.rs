//! Error handling for the HTTP surface.
//!
//! Route handlers return [`Error`], which implements axum's `IntoResponse`
//! so every failure reaches the caller as a structured JSON payload instead
//! of a panic or a bare status line.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vellum_common::CommonError;
use vellum_data::DatabaseError;
use vellum_intake::IntakeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other error: {0}")]
    Other(String),

    /// Intake validation or orchestration failure.
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// A store operation failed outside the intake path (e.g. job lookup).
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// General anyhow error, used at the bootstrap boundary.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CommonError for Error {
    fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    fn config_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    fn parse_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    fn other_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::io_error(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::Intake(IntakeError::InvalidInput { code, message }) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "code": code.as_str(), "message": message })),
            )
                .into_response(),
            Self::Database(DatabaseError::NotFound { .. }) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "error", "code": "not_found", "message": self.to_string() })),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "code": "internal_error", "message": other.to_string() })),
            )
                .into_response(),
        }
    }
}
