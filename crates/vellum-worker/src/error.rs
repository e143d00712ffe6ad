//! Error handling for the ingestion worker.
//!
//! Every stage handler returns a [`WorkerError`], which the worker loop
//! classifies into a [`vellum_data::ErrorKind`] to decide whether the job is
//! retried with backoff or deadlettered immediately. See
//! [`WorkerError::kind`].

use thiserror::Error;
use vellum_clients::ClientError;
use vellum_common::CommonError;
use vellum_data::{DatabaseError, ErrorKind};

/// Errors raised while driving a job through the stage machine.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// I/O failure outside the blob store adapter (rare; mostly startup paths).
    #[error("IO error: {0}")]
    Io(String),

    /// Missing or invalid worker configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A response or stored value could not be parsed into the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Catch-all for failures that don't fit another variant.
    #[error("Other error: {0}")]
    Other(String),

    /// The job store rejected or failed an operation.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The parser, embedding, or blob store adapter failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A stage handler's own invariant was violated by the data it was
    /// handed (empty parsed markdown, chunk/embedding count mismatch).
    #[error("{0}")]
    ContentInvariant(String),

    /// The job or document carried data a stage handler cannot act on.
    #[error("{0}")]
    InvalidInput(String),
}

impl WorkerError {
    /// Classify this failure for the worker loop's retry/deadletter decision.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ContentInvariant(_) => ErrorKind::ContentInvariant,
            Self::Database(err) => {
                if err.is_retryable() {
                    ErrorKind::StorageUnavailable
                } else {
                    ErrorKind::ContentInvariant
                }
            }
            Self::Client(err) => match err {
                ClientError::CircuitOpen(_) => ErrorKind::CircuitOpen,
                ClientError::Storage { .. } => ErrorKind::StorageUnavailable,
                ClientError::ContentInvariant(_) => ErrorKind::ContentInvariant,
                ClientError::InvalidResponse { .. } => ErrorKind::FatalRemote,
                ClientError::Http { .. } | ClientError::Network { .. } => {
                    if err.is_retryable() {
                        ErrorKind::TransientRemote
                    } else {
                        ErrorKind::FatalRemote
                    }
                }
            },
            Self::Io(_) | Self::Configuration(_) | Self::Parse(_) | Self::Other(_) => {
                ErrorKind::FatalRemote
            }
        }
    }
}

impl CommonError for WorkerError {
    fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    fn config_error(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    fn other_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result alias used throughout this crate.
pub type WorkerResult<T> = Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_open_is_retryable() {
        let err = WorkerError::Client(ClientError::CircuitOpen("embedding"));
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn content_invariant_is_fatal() {
        let err = WorkerError::ContentInvariant("empty parsed markdown".to_string());
        assert_eq!(err.kind(), ErrorKind::ContentInvariant);
        assert!(!err.kind().is_retryable());
    }

    #[test]
    fn fatal_http_status_is_not_retryable() {
        let err = WorkerError::Client(ClientError::Http {
            service: "parser",
            status: 404,
            body: String::new(),
        });
        assert_eq!(err.kind(), ErrorKind::FatalRemote);
    }

    #[test]
    fn five_hundred_http_status_is_retryable() {
        let err = WorkerError::Client(ClientError::Http {
            service: "embedding",
            status: 503,
            body: String::new(),
        });
        assert_eq!(err.kind(), ErrorKind::TransientRemote);
    }
}
