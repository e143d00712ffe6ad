//! Job-store error types

use thiserror::Error;

/// A database operation, carried in error context for diagnostics.
#[derive(Debug, Clone)]
pub enum DatabaseOperation {
    LeaseJob,
    InsertDocument,
    UpdateDocument,
    GetDocument,
    FindUserDocument,
    FindAnyDocument,
    CloneDocument,
    InsertChunks,
    GetChunks,
    UpsertChunkVector,
    CompleteJob,
    GetJob,
    Query { description: String },
}

impl std::fmt::Display for DatabaseOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LeaseJob => write!(f, "lease_job"),
            Self::InsertDocument => write!(f, "insert_document"),
            Self::UpdateDocument => write!(f, "update_document"),
            Self::GetDocument => write!(f, "get_document"),
            Self::FindUserDocument => write!(f, "find_user_document"),
            Self::FindAnyDocument => write!(f, "find_any_document"),
            Self::CloneDocument => write!(f, "clone_document"),
            Self::InsertChunks => write!(f, "insert_chunks"),
            Self::GetChunks => write!(f, "get_chunks"),
            Self::UpsertChunkVector => write!(f, "upsert_chunk_vector"),
            Self::CompleteJob => write!(f, "complete_job"),
            Self::GetJob => write!(f, "get_job"),
            Self::Query { description } => write!(f, "{description}"),
        }
    }
}

/// Errors raised by the job store.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("query failed during {operation}: {source}")]
    QueryFailed {
        operation: Box<DatabaseOperation>,
        #[source]
        source: sqlx::Error,
        correlation_id: Option<String>,
    },

    #[error("row not found during {operation}")]
    NotFound {
        operation: Box<DatabaseOperation>,
        correlation_id: Option<String>,
    },

    #[error("data integrity violation during {operation}: {message}")]
    DataIntegrityError {
        operation: Box<DatabaseOperation>,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("unexpected state during {operation}: {message}")]
    UnexpectedState {
        operation: Box<DatabaseOperation>,
        message: String,
        correlation_id: Option<String>,
    },

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DatabaseError {
    #[must_use]
    pub fn query_failed(
        operation: DatabaseOperation,
        source: sqlx::Error,
        correlation_id: Option<String>,
    ) -> Self {
        Self::QueryFailed {
            operation: Box::new(operation),
            source,
            correlation_id,
        }
    }

    /// A stable dotted code for logging and metrics.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::QueryFailed { .. } => "database.query_failed",
            Self::NotFound { .. } => "database.not_found",
            Self::DataIntegrityError { .. } => "database.data_integrity",
            Self::UnexpectedState { .. } => "database.unexpected_state",
            Self::Migration(_) => "database.migration_failed",
        }
    }

    /// Whether the caller should retry the surrounding operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::QueryFailed { .. })
    }
}

/// Result alias used throughout the job store.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Extension trait converting a raw `sqlx::Result` into `DatabaseResult` with
/// operation context attached.
pub trait DatabaseErrorExt<T> {
    fn map_db_err(
        self,
        operation: DatabaseOperation,
        correlation_id: Option<String>,
    ) -> DatabaseResult<T>;
}

impl<T> DatabaseErrorExt<T> for Result<T, sqlx::Error> {
    fn map_db_err(
        self,
        operation: DatabaseOperation,
        correlation_id: Option<String>,
    ) -> DatabaseResult<T> {
        self.map_err(|source| DatabaseError::query_failed(operation, source, correlation_id))
    }
}

/// Convenience for ad hoc queries that don't warrant a named
/// [`DatabaseOperation`] variant.
pub trait DatabaseErrorMsgExt<T> {
    fn map_db_err_msg(self, description: &str) -> DatabaseResult<T>;
}

impl<T> DatabaseErrorMsgExt<T> for Result<T, sqlx::Error> {
    fn map_db_err_msg(self, description: &str) -> DatabaseResult<T> {
        self.map_err(|source| {
            DatabaseError::query_failed(
                DatabaseOperation::Query {
                    description: description.to_string(),
                },
                source,
                None,
            )
        })
    }
}
