//! Repository trait for dependency injection and testing

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{Chunk, ChunkDraft, Document, Job, LastError, LeasedJob, Stage};

/// All persisted-state operations the ingestion pipeline needs.
///
/// Implemented against Postgres by [`crate::repository::DbRepository`] and
/// purely in-memory by [`crate::mock::MockRepository`] for unit tests.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Atomically claim the next eligible job for processing.
    ///
    /// Eligible jobs are in one of `active_stages`, in state `queued` or
    /// `retryable` with `retry_at` in the past, ordered oldest-first.
    /// Returns `None` when no job is eligible.
    async fn lease_job(&self, active_stages: &[Stage]) -> DatabaseResult<Option<LeasedJob>>;

    /// Insert a freshly-uploaded document together with a fresh job.
    ///
    /// When `(user_id, content_hash)` is genuinely new, the job starts at
    /// `job_validated`/`queued`. When a concurrent caller already inserted
    /// the same pair, the existing document row is returned paired with a
    /// *new* job created directly at the terminal stage in state `done`
    /// (mirroring the same-user-duplicate disposition in intake).
    async fn insert_document(&self, document: &Document) -> DatabaseResult<(Document, Job)>;

    /// Fetch a document by id.
    async fn get_document(&self, document_id: Uuid) -> DatabaseResult<Document>;

    /// Look up a document previously ingested by the same user with the same
    /// content hash.
    async fn find_user_document(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> DatabaseResult<Option<Document>>;

    /// Look up any document, regardless of owner, with the same content hash.
    async fn find_any_document(&self, content_hash: &str) -> DatabaseResult<Option<Document>>;

    /// Look up a document other than `exclude_document_id` that already has
    /// this parsed hash recorded, used to dedup at the parsed layer when two
    /// distinct uploads happen to parse to identical normalized markdown.
    async fn find_document_by_parsed_hash(
        &self,
        exclude_document_id: Uuid,
        parsed_hash: &str,
    ) -> DatabaseResult<Option<Document>>;

    /// Clone an existing document's parsed output and chunks (including
    /// vectors) for a new owner, producing a fresh document/job pair that
    /// starts at the terminal stage in state `done`.
    async fn clone_document_for_user(
        &self,
        source_document_id: Uuid,
        target_user_id: &str,
        target_filename: &str,
    ) -> DatabaseResult<(Document, Job)>;

    /// Record the parsed markdown path and hash on a document.
    async fn update_document_parsed(
        &self,
        document_id: Uuid,
        parsed_path: &str,
        parsed_hash: &str,
    ) -> DatabaseResult<()>;

    /// Insert chunk rows for a document, skipping any ordinal already present
    /// for the same `(document_id, chunker_name, chunker_version)` triple.
    async fn insert_chunks(
        &self,
        document_id: Uuid,
        chunker_name: &str,
        chunker_version: &str,
        drafts: &[ChunkDraft],
    ) -> DatabaseResult<Vec<Chunk>>;

    /// Fetch a document's chunks in ordinal order.
    async fn get_chunks_for_document(&self, document_id: Uuid) -> DatabaseResult<Vec<Chunk>>;

    /// Attach an embedding vector to a chunk.
    async fn upsert_chunk_vector(
        &self,
        chunk_id: Uuid,
        embed_model: &str,
        embed_version: &str,
        vector: &[f32],
        vector_integrity_hash: &str,
    ) -> DatabaseResult<()>;

    /// Fetch a job by id.
    async fn get_job(&self, job_id: Uuid) -> DatabaseResult<Job>;

    /// Advance a job to the next stage, in state `queued`, resetting its
    /// retry count and clearing any prior error.
    async fn advance_job(&self, job_id: Uuid, next_stage: Stage) -> DatabaseResult<Job>;

    /// Mark a job `done` at its current (terminal) stage.
    async fn complete_job(&self, job_id: Uuid) -> DatabaseResult<Job>;

    /// Record a stage-handler failure: either schedule a retry (`retryable`)
    /// or deadletter the job, depending on the caller's disposition.
    async fn fail_job(
        &self,
        job_id: Uuid,
        failed_stage: Stage,
        error: LastError,
        deadletter: bool,
    ) -> DatabaseResult<Job>;

    /// Cheap liveness probe for the health surface: succeeds if the store
    /// can round-trip a trivial query.
    async fn health_check(&self) -> DatabaseResult<()>;

    /// Update the running chunk/embed progress counters on a job.
    async fn update_job_progress(
        &self,
        job_id: Uuid,
        chunks_total: Option<i32>,
        chunks_done: Option<i32>,
        embeds_total: Option<i32>,
        embeds_done: Option<i32>,
    ) -> DatabaseResult<Job>;
}
