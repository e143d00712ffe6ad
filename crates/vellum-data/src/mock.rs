//! In-memory [`Repository`] for unit tests

#![allow(clippy::unwrap_used)]
#![allow(clippy::significant_drop_tightening)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseOperation, DatabaseResult};
use crate::ids;
use crate::models::{Chunk, ChunkDraft, Document, Job, JobState, LastError, LeasedJob, Stage};
use crate::traits::Repository;

#[derive(Default)]
struct State {
    documents: HashMap<Uuid, Document>,
    jobs: HashMap<Uuid, Job>,
    chunks: HashMap<Uuid, Chunk>,
}

/// Deterministic, fail-injectable in-memory repository.
///
/// Mirrors [`crate::repository::DbRepository`]'s semantics without a
/// database, for worker and intake unit tests.
#[derive(Clone, Default)]
pub struct MockRepository {
    state: Arc<Mutex<State>>,
    namespace: Uuid,
    fail_next: Arc<Mutex<Option<String>>>,
}

impl MockRepository {
    #[must_use]
    pub fn new(namespace: Uuid) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            namespace,
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    /// Arrange for the next call to any trait method to fail with `message`.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    fn check_fail(&self, operation: DatabaseOperation) -> DatabaseResult<()> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(DatabaseError::UnexpectedState {
                operation: Box::new(operation),
                message,
                correlation_id: None,
            });
        }
        Ok(())
    }

    fn insert_job(&self, state: &mut State, document_id: Uuid, stage: Stage, job_state: JobState) -> Job {
        let now = Utc::now();
        let job = Job {
            job_id: Uuid::new_v4(),
            document_id,
            stage,
            state: job_state,
            retry_count: 0,
            last_error: None,
            chunker_name: String::new(),
            chunker_version: String::new(),
            chunks_total: 0,
            chunks_done: 0,
            embeds_total: 0,
            embeds_done: 0,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.job_id, job.clone());
        job
    }

    /// Test helper: snapshot of every job currently held, for assertions.
    #[must_use]
    pub fn all_jobs(&self) -> Vec<Job> {
        self.state.lock().unwrap().jobs.values().cloned().collect()
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn lease_job(&self, active_stages: &[Stage]) -> DatabaseResult<Option<LeasedJob>> {
        self.check_fail(DatabaseOperation::LeaseJob)?;
        let mut state = self.state.lock().unwrap();

        let eligible = state
            .jobs
            .values()
            .filter(|j| active_stages.contains(&j.stage))
            .filter(|j| matches!(j.state, JobState::Queued | JobState::Working | JobState::Retryable))
            .filter(|j| match j.last_error.as_ref().and_then(|e| e.retry_at) {
                Some(retry_at) => retry_at <= Utc::now(),
                None => true,
            })
            .min_by_key(|j| j.created_at)
            .map(|j| j.job_id);

        let Some(job_id) = eligible else {
            return Ok(None);
        };

        let job = state.jobs.get_mut(&job_id).unwrap();
        job.state = JobState::Working;
        job.updated_at = Utc::now();
        let job = job.clone();
        let document = state.documents.get(&job.document_id).cloned().ok_or_else(|| {
            DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::LeaseJob),
                correlation_id: None,
            }
        })?;

        Ok(Some(LeasedJob { job, document }))
    }

    async fn insert_document(&self, document: &Document) -> DatabaseResult<(Document, Job)> {
        self.check_fail(DatabaseOperation::InsertDocument)?;
        let mut state = self.state.lock().unwrap();

        let existing = state
            .documents
            .values()
            .find(|d| d.user_id == document.user_id && d.content_hash == document.content_hash)
            .cloned();

        if let Some(existing) = existing {
            let job = self.insert_job(&mut state, existing.document_id, Stage::Embedded, JobState::Done);
            return Ok((existing, job));
        }

        state.documents.insert(document.document_id, document.clone());
        let job = self.insert_job(&mut state, document.document_id, Stage::JobValidated, JobState::Queued);
        Ok((document.clone(), job))
    }

    async fn get_document(&self, document_id: Uuid) -> DatabaseResult<Document> {
        self.check_fail(DatabaseOperation::GetDocument)?;
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::GetDocument),
                correlation_id: None,
            })
    }

    async fn find_user_document(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> DatabaseResult<Option<Document>> {
        self.check_fail(DatabaseOperation::FindUserDocument)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .values()
            .find(|d| d.user_id == user_id && d.content_hash == content_hash)
            .cloned())
    }

    async fn find_any_document(&self, content_hash: &str) -> DatabaseResult<Option<Document>> {
        self.check_fail(DatabaseOperation::FindAnyDocument)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .values()
            .filter(|d| d.content_hash == content_hash)
            .min_by_key(|d| d.created_at)
            .cloned())
    }

    async fn find_document_by_parsed_hash(
        &self,
        exclude_document_id: Uuid,
        parsed_hash: &str,
    ) -> DatabaseResult<Option<Document>> {
        self.check_fail(DatabaseOperation::FindAnyDocument)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .values()
            .filter(|d| d.document_id != exclude_document_id && d.parsed_hash.as_deref() == Some(parsed_hash))
            .min_by_key(|d| d.created_at)
            .cloned())
    }

    async fn clone_document_for_user(
        &self,
        source_document_id: Uuid,
        target_user_id: &str,
        target_filename: &str,
    ) -> DatabaseResult<(Document, Job)> {
        self.check_fail(DatabaseOperation::CloneDocument)?;
        let mut state = self.state.lock().unwrap();

        let source = state
            .documents
            .get(&source_document_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::CloneDocument),
                correlation_id: None,
            })?;

        let new_document_id = ids::document_id(self.namespace, target_user_id, &source.content_hash);
        let now = Utc::now();
        let new_document = Document {
            document_id: new_document_id,
            user_id: target_user_id.to_string(),
            filename: target_filename.to_string(),
            created_at: now,
            updated_at: now,
            ..source.clone()
        };
        state.documents.insert(new_document_id, new_document.clone());

        let source_chunks: Vec<Chunk> = state
            .chunks
            .values()
            .filter(|c| c.document_id == source_document_id)
            .cloned()
            .collect();

        for chunk in source_chunks {
            let new_chunk_id = ids::chunk_id(
                self.namespace,
                new_document_id,
                &chunk.chunker_name,
                &chunk.chunker_version,
                chunk.ordinal,
            );
            let new_chunk = Chunk {
                chunk_id: new_chunk_id,
                document_id: new_document_id,
                created_at: now,
                updated_at: now,
                ..chunk
            };
            state.chunks.insert(new_chunk_id, new_chunk);
        }

        let job = self.insert_job(&mut state, new_document_id, Stage::Embedded, JobState::Done);
        Ok((new_document, job))
    }

    async fn update_document_parsed(
        &self,
        document_id: Uuid,
        parsed_path: &str,
        parsed_hash: &str,
    ) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::UpdateDocument)?;
        let mut state = self.state.lock().unwrap();
        let document = state.documents.get_mut(&document_id).ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::UpdateDocument),
            correlation_id: None,
        })?;
        document.parsed_path = Some(parsed_path.to_string());
        document.parsed_hash = Some(parsed_hash.to_string());
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_chunks(
        &self,
        document_id: Uuid,
        chunker_name: &str,
        chunker_version: &str,
        drafts: &[ChunkDraft],
    ) -> DatabaseResult<Vec<Chunk>> {
        self.check_fail(DatabaseOperation::InsertChunks)?;
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        for draft in drafts {
            let chunk_id =
                ids::chunk_id(self.namespace, document_id, chunker_name, chunker_version, draft.ordinal);
            state.chunks.entry(chunk_id).or_insert_with(|| Chunk {
                chunk_id,
                document_id,
                ordinal: draft.ordinal,
                chunker_name: chunker_name.to_string(),
                chunker_version: chunker_version.to_string(),
                text: draft.text.clone(),
                text_hash: ids::hash_content(&draft.text),
                embed_model: None,
                embed_version: None,
                vector_dim: None,
                vector: None,
                vector_integrity_hash: None,
                created_at: now,
                updated_at: now,
            });
        }

        let mut chunks: Vec<Chunk> = state
            .chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.ordinal);
        Ok(chunks)
    }

    async fn get_chunks_for_document(&self, document_id: Uuid) -> DatabaseResult<Vec<Chunk>> {
        self.check_fail(DatabaseOperation::GetChunks)?;
        let mut chunks: Vec<Chunk> = self
            .state
            .lock()
            .unwrap()
            .chunks
            .values()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.ordinal);
        Ok(chunks)
    }

    async fn upsert_chunk_vector(
        &self,
        chunk_id: Uuid,
        embed_model: &str,
        embed_version: &str,
        vector: &[f32],
        vector_integrity_hash: &str,
    ) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::UpsertChunkVector)?;
        let mut state = self.state.lock().unwrap();
        let chunk = state.chunks.get_mut(&chunk_id).ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::UpsertChunkVector),
            correlation_id: None,
        })?;
        chunk.embed_model = Some(embed_model.to_string());
        chunk.embed_version = Some(embed_version.to_string());
        chunk.vector_dim = Some(i32::try_from(vector.len()).unwrap_or(i32::MAX));
        chunk.vector = Some(vector.to_vec());
        chunk.vector_integrity_hash = Some(vector_integrity_hash.to_string());
        chunk.updated_at = Utc::now();
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> DatabaseResult<Job> {
        self.check_fail(DatabaseOperation::GetJob)?;
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::GetJob),
                correlation_id: None,
            })
    }

    async fn advance_job(&self, job_id: Uuid, next_stage: Stage) -> DatabaseResult<Job> {
        self.check_fail(DatabaseOperation::Query { description: "advance_job".to_string() })?;
        let mut state = self.state.lock().unwrap();
        let job = state.jobs.get_mut(&job_id).ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::Query { description: "advance_job".to_string() }),
            correlation_id: None,
        })?;
        job.stage = next_stage;
        job.state = JobState::Queued;
        job.retry_count = 0;
        job.last_error = None;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn complete_job(&self, job_id: Uuid) -> DatabaseResult<Job> {
        self.check_fail(DatabaseOperation::CompleteJob)?;
        let mut state = self.state.lock().unwrap();
        let document_id = {
            let job = state.jobs.get_mut(&job_id).ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::CompleteJob),
                correlation_id: None,
            })?;
            job.state = JobState::Done;
            job.updated_at = Utc::now();
            job.document_id
        };
        if let Some(document) = state.documents.get_mut(&document_id) {
            document.processing_status = "completed".to_string();
            document.updated_at = Utc::now();
        }
        Ok(state.jobs[&job_id].clone())
    }

    async fn fail_job(
        &self,
        job_id: Uuid,
        failed_stage: Stage,
        error: LastError,
        deadletter: bool,
    ) -> DatabaseResult<Job> {
        self.check_fail(DatabaseOperation::Query { description: "fail_job".to_string() })?;
        let mut state = self.state.lock().unwrap();
        let document_id = {
            let job = state.jobs.get_mut(&job_id).ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::Query { description: "fail_job".to_string() }),
                correlation_id: None,
            })?;
            job.retry_count += 1;
            job.last_error = Some(error);
            job.updated_at = Utc::now();
            if deadletter {
                job.stage = failed_stage;
                job.state = JobState::Deadletter;
            } else {
                job.state = JobState::Retryable;
            }
            job.document_id
        };
        if deadletter {
            if let Some(document) = state.documents.get_mut(&document_id) {
                document.processing_status = failed_stage.as_str().to_string();
                document.updated_at = Utc::now();
            }
        }
        Ok(state.jobs[&job_id].clone())
    }

    async fn health_check(&self) -> DatabaseResult<()> {
        self.check_fail(DatabaseOperation::Query { description: "health_check".to_string() })
    }

    async fn update_job_progress(
        &self,
        job_id: Uuid,
        chunks_total: Option<i32>,
        chunks_done: Option<i32>,
        embeds_total: Option<i32>,
        embeds_done: Option<i32>,
    ) -> DatabaseResult<Job> {
        self.check_fail(DatabaseOperation::Query { description: "update_job_progress".to_string() })?;
        let mut state = self.state.lock().unwrap();
        let job = state.jobs.get_mut(&job_id).ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::Query { description: "update_job_progress".to_string() }),
            correlation_id: None,
        })?;
        if let Some(v) = chunks_total {
            job.chunks_total = v;
        }
        if let Some(v) = chunks_done {
            job.chunks_done = v;
        }
        if let Some(v) = embeds_total {
            job.embeds_total = v;
        }
        if let Some(v) = embeds_done {
            job.embeds_done = v;
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: Uuid = uuid::uuid!("7d9f9e2a-4c1b-4a3e-9f6d-2b8c5e1a7d3f");

    fn sample_document(user_id: &str, content_hash: &str) -> Document {
        let now = Utc::now();
        let document_id = ids::document_id(NS, user_id, content_hash);
        Document {
            document_id,
            user_id: user_id.to_string(),
            filename: "doc.pdf".to_string(),
            mime: "application/pdf".to_string(),
            byte_length: 1024,
            content_hash: content_hash.to_string(),
            parsed_hash: None,
            raw_path: format!("files/user/{user_id}/raw/{content_hash}.pdf"),
            parsed_path: None,
            processing_status: "job_validated".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_document_new_pair_starts_queued() {
        let repo = MockRepository::new(NS);
        let doc = sample_document("u1", "h1");
        let (stored, job) = repo.insert_document(&doc).await.unwrap();
        assert_eq!(stored.document_id, doc.document_id);
        assert_eq!(job.stage, Stage::JobValidated);
        assert_eq!(job.state, JobState::Queued);
    }

    #[tokio::test]
    async fn insert_document_duplicate_gets_terminal_job() {
        let repo = MockRepository::new(NS);
        let doc = sample_document("u1", "h1");
        repo.insert_document(&doc).await.unwrap();

        let (stored, job) = repo.insert_document(&doc).await.unwrap();
        assert_eq!(stored.document_id, doc.document_id);
        assert_eq!(job.stage, Stage::Embedded);
        assert_eq!(job.state, JobState::Done);
        assert_eq!(repo.all_jobs().len(), 2);
    }

    #[tokio::test]
    async fn lease_job_returns_oldest_eligible_and_marks_working() {
        let repo = MockRepository::new(NS);
        let doc = sample_document("u1", "h1");
        repo.insert_document(&doc).await.unwrap();

        let leased = repo.lease_job(&[Stage::JobValidated]).await.unwrap().unwrap();
        assert_eq!(leased.document.document_id, doc.document_id);

        let again = repo.lease_job(&[Stage::JobValidated]).await.unwrap();
        assert!(again.is_none(), "a freshly leased job is `working`, not `queued`, so it isn't re-offered immediately");
    }

    #[tokio::test]
    async fn fail_next_surfaces_injected_error() {
        let repo = MockRepository::new(NS);
        repo.fail_next("boom");
        let err = repo.get_document(Uuid::new_v4()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn clone_document_for_user_copies_chunks_with_vectors() {
        let repo = MockRepository::new(NS);
        let doc = sample_document("u1", "h1");
        repo.insert_document(&doc).await.unwrap();
        let drafts = vec![ChunkDraft { ordinal: 0, text: "hello".to_string(), start_line: 0, end_line: 0 }];
        let chunks = repo
            .insert_chunks(doc.document_id, "markdown-simple", "1", &drafts)
            .await
            .unwrap();
        repo.upsert_chunk_vector(chunks[0].chunk_id, "m", "v1", &[1.0, 2.0], "hash")
            .await
            .unwrap();

        let (cloned, job) = repo
            .clone_document_for_user(doc.document_id, "u2", "doc.pdf")
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Done);
        let cloned_chunks = repo.get_chunks_for_document(cloned.document_id).await.unwrap();
        assert_eq!(cloned_chunks.len(), 1);
        assert_eq!(cloned_chunks[0].vector, Some(vec![1.0, 2.0]));
        assert_ne!(cloned_chunks[0].chunk_id, chunks[0].chunk_id);
    }
}
