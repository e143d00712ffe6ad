//! Error type for the parser and embedding client adapters

use thiserror::Error;

/// Errors raised by the external client adapters.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A remote call returned an HTTP error status.
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The request could not reach the remote at all (DNS, connect, timeout).
    #[error("{service} network error: {message}")]
    Network { service: &'static str, message: String },

    /// The local circuit breaker refused the call.
    #[error("circuit open for {0}")]
    CircuitOpen(&'static str),

    /// A response could not be parsed into the expected shape.
    #[error("invalid response from {service}: {message}")]
    InvalidResponse { service: &'static str, message: String },

    /// The embedding response violated a content invariant (count or dimension mismatch).
    #[error("{0}")]
    ContentInvariant(String),

    /// The blob store could not complete a read or write.
    #[error("blob store error at {path}: {message}")]
    Storage { path: String, message: String },
}

impl ClientError {
    /// Whether this failure should be retried rather than treated as fatal,
    /// per the HTTP status classification in the external clients contract:
    /// `{429, 500, 502, 503, 504}` and network errors are retryable, other
    /// 4xx are fatal.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(*status, 429 | 500 | 502 | 503 | 504),
            Self::Network { .. } | Self::CircuitOpen(_) | Self::Storage { .. } => true,
            Self::InvalidResponse { .. } | Self::ContentInvariant(_) => false,
        }
    }
}

/// Result alias used throughout this crate.
pub type ClientResult<T> = Result<T, ClientError>;
