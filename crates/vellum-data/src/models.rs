//! Domain models for the ingestion pipeline's persisted entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-uploaded document and its processing status.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub document_id: Uuid,
    pub user_id: String,
    pub filename: String,
    pub mime: String,
    pub byte_length: i64,
    pub content_hash: String,
    pub parsed_hash: Option<String>,
    pub raw_path: String,
    pub parsed_path: Option<String>,
    pub processing_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Forward-only processing stages of the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    JobValidated,
    Parsing,
    Parsed,
    ParseValidated,
    Chunking,
    Chunked,
    Embedding,
    Embedded,
    FailedParse,
    FailedChunking,
    FailedEmbedding,
    FailedUnknown,
}

impl Stage {
    /// Ordinal position among the happy-path stages, used to compare a stage
    /// against the configured terminal stage. `failed_*` stages have no
    /// ordinal since they are terminal-by-failure, not terminal-by-progress.
    #[must_use]
    pub const fn ordinal(self) -> Option<u8> {
        match self {
            Self::JobValidated => Some(0),
            Self::Parsing => Some(1),
            Self::Parsed => Some(2),
            Self::ParseValidated => Some(3),
            Self::Chunking => Some(4),
            Self::Chunked => Some(5),
            Self::Embedding => Some(6),
            Self::Embedded => Some(7),
            Self::FailedParse | Self::FailedChunking | Self::FailedEmbedding | Self::FailedUnknown => {
                None
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JobValidated => "job_validated",
            Self::Parsing => "parsing",
            Self::Parsed => "parsed",
            Self::ParseValidated => "parse_validated",
            Self::Chunking => "chunking",
            Self::Chunked => "chunked",
            Self::Embedding => "embedding",
            Self::Embedded => "embedded",
            Self::FailedParse => "failed_parse",
            Self::FailedChunking => "failed_chunking",
            Self::FailedEmbedding => "failed_embedding",
            Self::FailedUnknown => "failed_unknown",
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_validated" => Ok(Self::JobValidated),
            "parsing" => Ok(Self::Parsing),
            "parsed" => Ok(Self::Parsed),
            "parse_validated" => Ok(Self::ParseValidated),
            "chunking" => Ok(Self::Chunking),
            "chunked" => Ok(Self::Chunked),
            "embedding" => Ok(Self::Embedding),
            "embedded" => Ok(Self::Embedded),
            "failed_parse" => Ok(Self::FailedParse),
            "failed_chunking" => Ok(Self::FailedChunking),
            "failed_embedding" => Ok(Self::FailedEmbedding),
            "failed_unknown" => Ok(Self::FailedUnknown),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a job, orthogonal to its stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Working,
    Retryable,
    Done,
    Deadletter,
}

impl JobState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Working => "working",
            Self::Retryable => "retryable",
            Self::Done => "done",
            Self::Deadletter => "deadletter",
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "working" => Ok(Self::Working),
            "retryable" => Ok(Self::Retryable),
            "done" => Ok(Self::Done),
            "deadletter" => Ok(Self::Deadletter),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a stage-handler failure, driving retry/deadletter disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    TransientRemote,
    FatalRemote,
    ContentInvariant,
    StorageUnavailable,
    CircuitOpen,
    RetriesExhausted,
}

impl ErrorKind {
    /// Whether a failure of this kind should be retried rather than deadlettered.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::TransientRemote | Self::StorageUnavailable | Self::CircuitOpen
        )
    }
}

/// Structured last-error record stored alongside a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    pub retry_at: Option<DateTime<Utc>>,
}

/// A job tracking one document's progress through the stage machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub stage: Stage,
    pub state: JobState,
    pub retry_count: i32,
    pub last_error: Option<LastError>,
    pub chunker_name: String,
    pub chunker_version: String,
    pub chunks_total: i32,
    pub chunks_done: i32,
    pub embeds_total: i32,
    pub embeds_done: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Named progress counters as surfaced by the job inspection API.
    #[must_use]
    pub fn progress(&self) -> std::collections::HashMap<&'static str, i32> {
        std::collections::HashMap::from([
            ("chunks_total", self.chunks_total),
            ("chunks_done", self.chunks_done),
            ("embeds_total", self.embeds_total),
            ("embeds_done", self.embeds_done),
        ])
    }
}

/// A chunk of a document's parsed text, with an optional embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub ordinal: i32,
    pub chunker_name: String,
    pub chunker_version: String,
    pub text: String,
    pub text_hash: String,
    pub embed_model: Option<String>,
    pub embed_version: Option<String>,
    pub vector_dim: Option<i32>,
    pub vector: Option<Vec<f32>>,
    pub vector_integrity_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a markdown-chunking pass, before chunk ids are assigned.
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub ordinal: i32,
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// A job dequeued from the shared queue, ready for a stage handler.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub job: Job,
    pub document: Document,
}
