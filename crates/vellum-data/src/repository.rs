//! Postgres-backed implementation of [`crate::traits::Repository`]

use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::error::{DatabaseError, DatabaseErrorExt, DatabaseErrorMsgExt, DatabaseOperation, DatabaseResult};
use crate::ids;
use crate::models::{Chunk, ChunkDraft, Document, Job, JobState, LastError, LeasedJob, Stage};
use crate::pool_manager::PoolManager;
use crate::traits::Repository;

/// Job states eligible for lease. `working` is included alongside `queued`
/// and `retryable` so a job stranded mid-lease by a worker that died between
/// committing the lease and committing its stage-handler transaction gets
/// picked back up; `SELECT ... FOR UPDATE SKIP LOCKED` already prevents two
/// live workers from leasing the same row, so re-offering `working` rows is
/// safe.
const LEASABLE_STATES: [&str; 3] = ["queued", "working", "retryable"];

/// Postgres-backed job store.
pub struct DbRepository {
    pools: PoolManager,
    namespace: Uuid,
}

impl DbRepository {
    #[must_use]
    pub const fn new(pools: PoolManager, namespace: Uuid) -> Self {
        Self { pools, namespace }
    }
}

fn row_to_document(row: &PgRow) -> sqlx::Result<Document> {
    Ok(Document {
        document_id: row.try_get("document_id")?,
        user_id: row.try_get("user_id")?,
        filename: row.try_get("filename")?,
        mime: row.try_get("mime")?,
        byte_length: row.try_get("byte_length")?,
        content_hash: row.try_get("content_hash")?,
        parsed_hash: row.try_get("parsed_hash")?,
        raw_path: row.try_get("raw_path")?,
        parsed_path: row.try_get("parsed_path")?,
        processing_status: row.try_get("processing_status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_job(row: &PgRow) -> sqlx::Result<Job> {
    let stage: String = row.try_get("stage")?;
    let state: String = row.try_get("state")?;
    let last_error: Option<serde_json::Value> = row.try_get("last_error")?;
    Ok(Job {
        job_id: row.try_get("job_id")?,
        document_id: row.try_get("document_id")?,
        stage: stage.parse().unwrap_or(Stage::FailedUnknown),
        state: state.parse().unwrap_or(JobState::Deadletter),
        retry_count: row.try_get("retry_count")?,
        last_error: last_error.and_then(|v| serde_json::from_value(v).ok()),
        chunker_name: row.try_get("chunker_name")?,
        chunker_version: row.try_get("chunker_version")?,
        chunks_total: row.try_get("chunks_total")?,
        chunks_done: row.try_get("chunks_done")?,
        embeds_total: row.try_get("embeds_total")?,
        embeds_done: row.try_get("embeds_done")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_chunk(row: &PgRow) -> sqlx::Result<Chunk> {
    let vector: Option<Vec<f64>> = row.try_get("vector")?;
    Ok(Chunk {
        chunk_id: row.try_get("chunk_id")?,
        document_id: row.try_get("document_id")?,
        ordinal: row.try_get("ordinal")?,
        chunker_name: row.try_get("chunker_name")?,
        chunker_version: row.try_get("chunker_version")?,
        text: row.try_get("text")?,
        text_hash: row.try_get("text_hash")?,
        embed_model: row.try_get("embed_model")?,
        embed_version: row.try_get("embed_version")?,
        vector_dim: row.try_get("vector_dim")?,
        vector: vector.map(|v| v.into_iter().map(|x| x as f32).collect()),
        vector_integrity_hash: row.try_get("vector_integrity_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Blob store paths are deterministic in `(user_id, document_id)` so a
/// re-run of a stage handler overwrites the same location.
#[must_use]
pub fn raw_path(user_id: &str, document_id: Uuid, ext: &str) -> String {
    let doc_hash = &ids::hash_content(&document_id.to_string())[..8];
    format!("files/user/{user_id}/raw/{doc_hash}.{ext}")
}

/// Deterministic blob store location for a document's parsed markdown.
/// Exposed so the worker can compute it without a round trip to the store.
#[must_use]
pub fn parsed_path(user_id: &str, document_id: Uuid) -> String {
    let doc_hash = &ids::hash_content(&document_id.to_string())[..8];
    format!("files/user/{user_id}/parsed/{doc_hash}.md")
}

/// Insert a fresh job row for `document_id` directly at `(stage, state)`.
/// Used both for brand-new intake (`job_validated`/`queued`) and for dedup
/// paths that skip straight to the terminal stage (`embedded`/`done`).
async fn insert_job(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    document_id: Uuid,
    stage: Stage,
    state: JobState,
) -> DatabaseResult<Job> {
    let job_id = Uuid::new_v4();
    let row = sqlx::query(
        r"
        INSERT INTO jobs
            (job_id, document_id, stage, state, retry_count, chunker_name, chunker_version,
             chunks_total, chunks_done, embeds_total, embeds_done, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 0, '', '', 0, 0, 0, 0, NOW(), NOW())
        RETURNING *
        ",
    )
    .bind(job_id)
    .bind(document_id)
    .bind(stage.as_str())
    .bind(state.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_db_err_msg("insert_job")?;
    row_to_job(&row).map_db_err_msg("insert_job: decode row")
}

#[async_trait]
impl Repository for DbRepository {
    #[tracing::instrument(skip(self, active_stages))]
    async fn lease_job(&self, active_stages: &[Stage]) -> DatabaseResult<Option<LeasedJob>> {
        let stages: Vec<&str> = active_stages.iter().map(|s| s.as_str()).collect();
        let pool = self.pools.write_pool();

        let row = sqlx::query(
            r"
            WITH candidate AS (
                SELECT job_id FROM jobs
                WHERE stage = ANY($1)
                  AND state = ANY($2)
                  AND (
                      last_error IS NULL
                      OR last_error->>'retry_at' IS NULL
                      OR (last_error->>'retry_at')::timestamptz <= NOW()
                  )
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs j
            SET state = 'working', updated_at = NOW()
            FROM candidate
            WHERE j.job_id = candidate.job_id
            RETURNING j.*
            ",
        )
        .bind(&stages as &[&str])
        .bind(LEASABLE_STATES)
        .fetch_optional(pool)
        .await
        .map_db_err(DatabaseOperation::LeaseJob, None)?;

        let Some(job_row) = row else {
            return Ok(None);
        };
        let job = row_to_job(&job_row).map_db_err(DatabaseOperation::LeaseJob, None)?;

        let doc_row = sqlx::query("SELECT * FROM documents WHERE document_id = $1")
            .bind(job.document_id)
            .fetch_one(pool)
            .await
            .map_db_err(DatabaseOperation::LeaseJob, None)?;
        let document = row_to_document(&doc_row).map_db_err(DatabaseOperation::LeaseJob, None)?;

        Ok(Some(LeasedJob { job, document }))
    }

    #[tracing::instrument(skip(self, document))]
    async fn insert_document(&self, document: &Document) -> DatabaseResult<(Document, Job)> {
        let pool = self.pools.write_pool();
        let mut tx = pool
            .begin()
            .await
            .map_db_err(DatabaseOperation::InsertDocument, None)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO documents
                (document_id, user_id, filename, mime, byte_length, content_hash,
                 raw_path, processing_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            ON CONFLICT (user_id, content_hash) DO NOTHING
            RETURNING *
            ",
        )
        .bind(document.document_id)
        .bind(&document.user_id)
        .bind(&document.filename)
        .bind(&document.mime)
        .bind(document.byte_length)
        .bind(&document.content_hash)
        .bind(&document.raw_path)
        .bind(&document.processing_status)
        .fetch_optional(&mut *tx)
        .await
        .map_db_err(DatabaseOperation::InsertDocument, None)?;

        let (stored, job) = if let Some(row) = inserted {
            let stored = row_to_document(&row).map_db_err(DatabaseOperation::InsertDocument, None)?;
            let job = insert_job(&mut tx, stored.document_id, Stage::JobValidated, JobState::Queued).await?;
            (stored, job)
        } else {
            let row = sqlx::query("SELECT * FROM documents WHERE user_id = $1 AND content_hash = $2")
                .bind(&document.user_id)
                .bind(&document.content_hash)
                .fetch_one(&mut *tx)
                .await
                .map_db_err(DatabaseOperation::InsertDocument, None)?;
            let stored = row_to_document(&row).map_db_err(DatabaseOperation::InsertDocument, None)?;
            let job = insert_job(&mut tx, stored.document_id, Stage::Embedded, JobState::Done).await?;
            (stored, job)
        };

        tx.commit().await.map_db_err(DatabaseOperation::InsertDocument, None)?;
        Ok((stored, job))
    }

    #[tracing::instrument(skip(self))]
    async fn get_document(&self, document_id: Uuid) -> DatabaseResult<Document> {
        let row = sqlx::query("SELECT * FROM documents WHERE document_id = $1")
            .bind(document_id)
            .fetch_optional(self.pools.read_pool())
            .await
            .map_db_err(DatabaseOperation::GetDocument, None)?
            .ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::GetDocument),
                correlation_id: None,
            })?;
        row_to_document(&row).map_db_err(DatabaseOperation::GetDocument, None)
    }

    #[tracing::instrument(skip(self))]
    async fn find_user_document(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> DatabaseResult<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE user_id = $1 AND content_hash = $2")
            .bind(user_id)
            .bind(content_hash)
            .fetch_optional(self.pools.read_pool())
            .await
            .map_db_err(DatabaseOperation::FindUserDocument, None)?;
        row.map(|r| row_to_document(&r).map_db_err(DatabaseOperation::FindUserDocument, None))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_any_document(&self, content_hash: &str) -> DatabaseResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT * FROM documents WHERE content_hash = $1 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(content_hash)
        .fetch_optional(self.pools.read_pool())
        .await
        .map_db_err(DatabaseOperation::FindAnyDocument, None)?;
        row.map(|r| row_to_document(&r).map_db_err(DatabaseOperation::FindAnyDocument, None))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_document_by_parsed_hash(
        &self,
        exclude_document_id: Uuid,
        parsed_hash: &str,
    ) -> DatabaseResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT * FROM documents WHERE parsed_hash = $1 AND document_id != $2 \
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(parsed_hash)
        .bind(exclude_document_id)
        .fetch_optional(self.pools.read_pool())
        .await
        .map_db_err(DatabaseOperation::FindAnyDocument, None)?;
        row.map(|r| row_to_document(&r).map_db_err(DatabaseOperation::FindAnyDocument, None))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn clone_document_for_user(
        &self,
        source_document_id: Uuid,
        target_user_id: &str,
        target_filename: &str,
    ) -> DatabaseResult<(Document, Job)> {
        let pool = self.pools.write_pool();
        let mut tx = pool
            .begin()
            .await
            .map_db_err(DatabaseOperation::CloneDocument, None)?;

        let source_row = sqlx::query("SELECT * FROM documents WHERE document_id = $1")
            .bind(source_document_id)
            .fetch_optional(&mut *tx)
            .await
            .map_db_err(DatabaseOperation::CloneDocument, None)?
            .ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::CloneDocument),
                correlation_id: None,
            })?;
        let source = row_to_document(&source_row).map_db_err(DatabaseOperation::CloneDocument, None)?;

        let new_document_id = ids::document_id(self.namespace, target_user_id, &source.content_hash);
        let ext = source.raw_path.rsplit('.').next().unwrap_or("bin");
        let new_raw_path = raw_path(target_user_id, new_document_id, ext);
        let new_parsed_path = source
            .parsed_path
            .as_ref()
            .map(|_| parsed_path(target_user_id, new_document_id));

        let new_doc_row = sqlx::query(
            r"
            INSERT INTO documents
                (document_id, user_id, filename, mime, byte_length, content_hash,
                 parsed_hash, raw_path, parsed_path, processing_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
            RETURNING *
            ",
        )
        .bind(new_document_id)
        .bind(target_user_id)
        .bind(target_filename)
        .bind(&source.mime)
        .bind(source.byte_length)
        .bind(&source.content_hash)
        .bind(&source.parsed_hash)
        .bind(&new_raw_path)
        .bind(&new_parsed_path)
        .bind(&source.processing_status)
        .fetch_one(&mut *tx)
        .await
        .map_db_err(DatabaseOperation::CloneDocument, None)?;
        let new_document =
            row_to_document(&new_doc_row).map_db_err(DatabaseOperation::CloneDocument, None)?;

        let source_chunks = sqlx::query("SELECT * FROM chunks WHERE document_id = $1 ORDER BY ordinal")
            .bind(source_document_id)
            .fetch_all(&mut *tx)
            .await
            .map_db_err(DatabaseOperation::CloneDocument, None)?;

        for chunk_row in &source_chunks {
            let chunk = row_to_chunk(chunk_row).map_db_err(DatabaseOperation::CloneDocument, None)?;
            let new_chunk_id = ids::chunk_id(
                self.namespace,
                new_document_id,
                &chunk.chunker_name,
                &chunk.chunker_version,
                chunk.ordinal,
            );
            let vector_f64: Option<Vec<f64>> =
                chunk.vector.as_ref().map(|v| v.iter().map(|x| f64::from(*x)).collect());

            sqlx::query(
                r"
                INSERT INTO chunks
                    (chunk_id, document_id, ordinal, chunker_name, chunker_version, text, text_hash,
                     embed_model, embed_version, vector_dim, vector, vector_integrity_hash,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
                ",
            )
            .bind(new_chunk_id)
            .bind(new_document_id)
            .bind(chunk.ordinal)
            .bind(&chunk.chunker_name)
            .bind(&chunk.chunker_version)
            .bind(&chunk.text)
            .bind(&chunk.text_hash)
            .bind(&chunk.embed_model)
            .bind(&chunk.embed_version)
            .bind(chunk.vector_dim)
            .bind(&vector_f64)
            .bind(&chunk.vector_integrity_hash)
            .execute(&mut *tx)
            .await
            .map_db_err(DatabaseOperation::CloneDocument, None)?;
        }

        let job = insert_job(&mut tx, new_document_id, Stage::Embedded, JobState::Done).await?;

        tx.commit().await.map_db_err(DatabaseOperation::CloneDocument, None)?;
        Ok((new_document, job))
    }

    #[tracing::instrument(skip(self))]
    async fn update_document_parsed(
        &self,
        document_id: Uuid,
        parsed_path: &str,
        parsed_hash: &str,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE documents SET parsed_path = $1, parsed_hash = $2, updated_at = NOW() WHERE document_id = $3",
        )
        .bind(parsed_path)
        .bind(parsed_hash)
        .bind(document_id)
        .execute(self.pools.write_pool())
        .await
        .map_db_err(DatabaseOperation::UpdateDocument, None)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, drafts))]
    async fn insert_chunks(
        &self,
        document_id: Uuid,
        chunker_name: &str,
        chunker_version: &str,
        drafts: &[ChunkDraft],
    ) -> DatabaseResult<Vec<Chunk>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = drafts
            .iter()
            .map(|d| ids::chunk_id(self.namespace, document_id, chunker_name, chunker_version, d.ordinal))
            .collect();
        let ordinals: Vec<i32> = drafts.iter().map(|d| d.ordinal).collect();
        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let hashes: Vec<String> = drafts.iter().map(|d| ids::hash_content(&d.text)).collect();
        let document_ids = vec![document_id; drafts.len()];
        let chunker_names = vec![chunker_name.to_string(); drafts.len()];
        let chunker_versions = vec![chunker_version.to_string(); drafts.len()];

        sqlx::query(
            r"
            INSERT INTO chunks
                (chunk_id, document_id, ordinal, chunker_name, chunker_version, text, text_hash, created_at, updated_at)
            SELECT chunk_id, document_id, ordinal, chunker_name, chunker_version, text, text_hash, NOW(), NOW()
            FROM UNNEST($1::uuid[], $2::uuid[], $3::int4[], $4::text[], $5::text[], $6::text[], $7::text[])
                AS t(chunk_id, document_id, ordinal, chunker_name, chunker_version, text, text_hash)
            ON CONFLICT (document_id, chunker_name, chunker_version, ordinal) DO NOTHING
            ",
        )
        .bind(&ids)
        .bind(&document_ids)
        .bind(&ordinals)
        .bind(&chunker_names)
        .bind(&chunker_versions)
        .bind(&texts)
        .bind(&hashes)
        .execute(self.pools.write_pool())
        .await
        .map_db_err(DatabaseOperation::InsertChunks, None)?;

        self.get_chunks_for_document(document_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_chunks_for_document(&self, document_id: Uuid) -> DatabaseResult<Vec<Chunk>> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE document_id = $1 ORDER BY ordinal")
            .bind(document_id)
            .fetch_all(self.pools.read_pool())
            .await
            .map_db_err(DatabaseOperation::GetChunks, None)?;
        rows.iter()
            .map(|r| row_to_chunk(r).map_db_err(DatabaseOperation::GetChunks, None))
            .collect()
    }

    #[tracing::instrument(skip(self, vector))]
    async fn upsert_chunk_vector(
        &self,
        chunk_id: Uuid,
        embed_model: &str,
        embed_version: &str,
        vector: &[f32],
        vector_integrity_hash: &str,
    ) -> DatabaseResult<()> {
        let vector_f64: Vec<f64> = vector.iter().map(|x| f64::from(*x)).collect();
        let dim = i32::try_from(vector.len()).unwrap_or(i32::MAX);
        sqlx::query(
            r"
            UPDATE chunks
            SET embed_model = $1, embed_version = $2, vector_dim = $3, vector = $4,
                vector_integrity_hash = $5, updated_at = NOW()
            WHERE chunk_id = $6
            ",
        )
        .bind(embed_model)
        .bind(embed_version)
        .bind(dim)
        .bind(&vector_f64)
        .bind(vector_integrity_hash)
        .bind(chunk_id)
        .execute(self.pools.write_pool())
        .await
        .map_db_err(DatabaseOperation::UpsertChunkVector, None)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_job(&self, job_id: Uuid) -> DatabaseResult<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(self.pools.read_pool())
            .await
            .map_db_err(DatabaseOperation::GetJob, None)?
            .ok_or_else(|| DatabaseError::NotFound {
                operation: Box::new(DatabaseOperation::GetJob),
                correlation_id: None,
            })?;
        row_to_job(&row).map_db_err(DatabaseOperation::GetJob, None)
    }

    #[tracing::instrument(skip(self))]
    async fn advance_job(&self, job_id: Uuid, next_stage: Stage) -> DatabaseResult<Job> {
        let row = sqlx::query(
            r"
            UPDATE jobs
            SET stage = $1, state = 'queued', retry_count = 0, last_error = NULL, updated_at = NOW()
            WHERE job_id = $2
            RETURNING *
            ",
        )
        .bind(next_stage.as_str())
        .bind(job_id)
        .fetch_optional(self.pools.write_pool())
        .await
        .map_db_err_msg("advance_job")?
        .ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::Query { description: "advance_job".to_string() }),
            correlation_id: None,
        })?;
        row_to_job(&row).map_db_err_msg("advance_job: decode row")
    }

    #[tracing::instrument(skip(self))]
    async fn complete_job(&self, job_id: Uuid) -> DatabaseResult<Job> {
        let pool = self.pools.write_pool();
        let mut tx = pool.begin().await.map_db_err(DatabaseOperation::CompleteJob, None)?;

        let row = sqlx::query(
            "UPDATE jobs SET state = 'done', updated_at = NOW() WHERE job_id = $1 RETURNING *",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_db_err(DatabaseOperation::CompleteJob, None)?
        .ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::CompleteJob),
            correlation_id: None,
        })?;
        let job = row_to_job(&row).map_db_err(DatabaseOperation::CompleteJob, None)?;

        sqlx::query(
            "UPDATE documents SET processing_status = 'completed', updated_at = NOW() WHERE document_id = $1",
        )
        .bind(job.document_id)
        .execute(&mut *tx)
        .await
        .map_db_err(DatabaseOperation::CompleteJob, None)?;

        tx.commit().await.map_db_err(DatabaseOperation::CompleteJob, None)?;
        Ok(job)
    }

    #[tracing::instrument(skip(self, error))]
    async fn fail_job(
        &self,
        job_id: Uuid,
        failed_stage: Stage,
        error: LastError,
        deadletter: bool,
    ) -> DatabaseResult<Job> {
        let pool = self.pools.write_pool();
        let mut tx = pool.begin().await.map_db_err_msg("fail_job: begin transaction")?;

        let error_json = serde_json::to_value(&error).map_err(|e| DatabaseError::DataIntegrityError {
            operation: Box::new(DatabaseOperation::Query { description: "fail_job".to_string() }),
            message: e.to_string(),
            correlation_id: None,
        })?;

        let row = if deadletter {
            sqlx::query(
                r"
                UPDATE jobs
                SET stage = $1, state = 'deadletter', last_error = $2,
                    retry_count = retry_count + 1, updated_at = NOW()
                WHERE job_id = $3
                RETURNING *
                ",
            )
            .bind(failed_stage.as_str())
            .bind(&error_json)
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await
        } else {
            sqlx::query(
                r"
                UPDATE jobs
                SET state = 'retryable', last_error = $1, retry_count = retry_count + 1, updated_at = NOW()
                WHERE job_id = $2
                RETURNING *
                ",
            )
            .bind(&error_json)
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await
        }
        .map_db_err_msg("fail_job: update job")?
        .ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::Query { description: "fail_job".to_string() }),
            correlation_id: None,
        })?;
        let job = row_to_job(&row).map_db_err_msg("fail_job: decode row")?;

        if deadletter {
            sqlx::query(
                "UPDATE documents SET processing_status = $1, updated_at = NOW() WHERE document_id = $2",
            )
            .bind(failed_stage.as_str())
            .bind(job.document_id)
            .execute(&mut *tx)
            .await
            .map_db_err_msg("fail_job: update document status")?;
        }

        tx.commit().await.map_db_err_msg("fail_job: commit")?;
        Ok(job)
    }

    #[tracing::instrument(skip(self))]
    async fn health_check(&self) -> DatabaseResult<()> {
        sqlx::query("SELECT 1")
            .execute(self.pools.read_pool())
            .await
            .map_db_err_msg("health_check")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn update_job_progress(
        &self,
        job_id: Uuid,
        chunks_total: Option<i32>,
        chunks_done: Option<i32>,
        embeds_total: Option<i32>,
        embeds_done: Option<i32>,
    ) -> DatabaseResult<Job> {
        let row = sqlx::query(
            r"
            UPDATE jobs
            SET chunks_total = COALESCE($1, chunks_total),
                chunks_done = COALESCE($2, chunks_done),
                embeds_total = COALESCE($3, embeds_total),
                embeds_done = COALESCE($4, embeds_done),
                updated_at = NOW()
            WHERE job_id = $5
            RETURNING *
            ",
        )
        .bind(chunks_total)
        .bind(chunks_done)
        .bind(embeds_total)
        .bind(embeds_done)
        .bind(job_id)
        .fetch_optional(self.pools.write_pool())
        .await
        .map_db_err_msg("update_job_progress")?
        .ok_or_else(|| DatabaseError::NotFound {
            operation: Box::new(DatabaseOperation::Query { description: "update_job_progress".to_string() }),
            correlation_id: None,
        })?;
        row_to_job(&row).map_db_err_msg("update_job_progress: decode row")
    }
}

/// Map an active stage to its corresponding `failed_*` deadletter stage.
#[must_use]
pub const fn failed_stage_for(stage: Stage) -> Stage {
    match stage {
        Stage::Parsing => Stage::FailedParse,
        Stage::Chunking => Stage::FailedChunking,
        Stage::Embedding => Stage::FailedEmbedding,
        _ => Stage::FailedUnknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_stage_maps_each_active_stage() {
        assert_eq!(failed_stage_for(Stage::Parsing), Stage::FailedParse);
        assert_eq!(failed_stage_for(Stage::Chunking), Stage::FailedChunking);
        assert_eq!(failed_stage_for(Stage::Embedding), Stage::FailedEmbedding);
        assert_eq!(failed_stage_for(Stage::ParseValidated), Stage::FailedUnknown);
    }
}
