//! Stage handlers: one function per active stage the worker loop dispatches
//! on. Each takes the job as leased and either advances it or returns a
//! [`WorkerError`] for the loop to classify into a retry or a deadletter.

use vellum_data::{LeasedJob, Stage, ids};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

/// `job_validated` → `parsed`: submit the raw artifact to the parser and
/// persist the resulting markdown at the document's canonical parsed path.
///
/// Idempotent: the parsed path is derived solely from `(user_id,
/// document_id)`, so a retried run overwrites the same blob.
pub async fn run_parsing(ctx: &WorkerContext, leased: &LeasedJob) -> WorkerResult<()> {
    let document = &leased.document;
    let markdown = ctx.parser.convert(leased.job.job_id, &document.raw_path).await?;

    let path = vellum_data::parsed_path(&document.user_id, document.document_id);
    ctx.blob_store.put(&path, markdown.as_bytes()).await?;

    ctx.repo.advance_job(leased.job.job_id, Stage::Parsed).await?;
    Ok(())
}

/// `parsed` → `parse_validated`: normalize the parsed markdown, hash it, and
/// record both on the document. An empty document after normalization is a
/// content invariant violation, not a transient failure.
///
/// If another document already carries this exact parsed hash, this
/// document's parsed path is rewritten to point at that canonical artifact
/// instead of the one this handler just wrote — dedup at the parsed layer,
/// independent of the content-hash dedup performed at intake.
pub async fn run_parse_validation(ctx: &WorkerContext, leased: &LeasedJob) -> WorkerResult<()> {
    let document = &leased.document;
    let own_path = vellum_data::parsed_path(&document.user_id, document.document_id);

    let bytes = ctx.blob_store.get(&own_path).await?;
    let raw = String::from_utf8(bytes)
        .map_err(|err| WorkerError::ContentInvariant(format!("parsed artifact is not valid UTF-8: {err}")))?;
    let normalized = ids::normalize_markdown(&raw);

    if normalized.is_empty() {
        return Err(WorkerError::ContentInvariant(
            "parsed markdown is empty after normalization".to_string(),
        ));
    }

    let hash = ids::hash_content(&normalized);
    let canonical = ctx
        .repo
        .find_document_by_parsed_hash(document.document_id, &hash)
        .await?
        .and_then(|other| other.parsed_path)
        .unwrap_or(own_path);

    ctx.repo.update_document_parsed(document.document_id, &canonical, &hash).await?;
    ctx.repo.advance_job(leased.job.job_id, Stage::ParseValidated).await?;
    Ok(())
}

/// `parse_validated` → `chunked`: split the normalized markdown into ordered
/// chunks and persist them, recording progress counters on the job.
pub async fn run_chunking(ctx: &WorkerContext, leased: &LeasedJob) -> WorkerResult<()> {
    let document = &leased.document;
    let path = document
        .parsed_path
        .clone()
        .ok_or_else(|| WorkerError::ContentInvariant("document has no parsed_path at chunking time".to_string()))?;

    let bytes = ctx.blob_store.get(&path).await?;
    let text = String::from_utf8(bytes)
        .map_err(|err| WorkerError::ContentInvariant(format!("parsed artifact is not valid UTF-8: {err}")))?;

    let drafts = ctx.chunker.chunk(&text);
    let chunks = ctx
        .repo
        .insert_chunks(document.document_id, &ctx.chunker_name, &ctx.chunker_version, &drafts)
        .await?;

    let count = i32::try_from(chunks.len()).unwrap_or(i32::MAX);
    ctx.repo
        .update_job_progress(leased.job.job_id, Some(count), Some(count), None, None)
        .await?;
    ctx.repo.advance_job(leased.job.job_id, Stage::Chunked).await?;
    Ok(())
}

/// `chunked` → `embedded` (→ `done` when `embedded` is the terminal stage):
/// embed every chunk of the document in ordinal order and attach the
/// resulting vectors.
pub async fn run_embedding(ctx: &WorkerContext, leased: &LeasedJob) -> WorkerResult<()> {
    let document_id = leased.document.document_id;
    let chunks = ctx.repo.get_chunks_for_document(document_id).await?;

    if chunks.is_empty() {
        return Err(WorkerError::ContentInvariant("document has no chunks to embed".to_string()));
    }

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = ctx.embedder.embed(&texts).await?;

    if vectors.len() != chunks.len() {
        return Err(WorkerError::ContentInvariant(format!(
            "embedding returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
        let integrity_hash = ids::hash_vector(vector);
        ctx.repo
            .upsert_chunk_vector(chunk.chunk_id, &ctx.embed_model, &ctx.embed_version, vector, &integrity_hash)
            .await?;
    }

    let count = i32::try_from(chunks.len()).unwrap_or(i32::MAX);
    ctx.repo
        .update_job_progress(leased.job.job_id, None, None, Some(count), Some(count))
        .await?;

    let job = ctx.repo.advance_job(leased.job.job_id, Stage::Embedded).await?;
    if job.stage == ctx.terminal_stage {
        ctx.repo.complete_job(leased.job.job_id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;
    use vellum_chunker::MarkdownChunker;
    use vellum_clients::{MockBlobStore, MockEmbeddingClient, MockParserClient};
    use vellum_data::{Document, Job, JobState, MockRepository};

    use super::*;

    const NS: Uuid = uuid::uuid!("7d9f9e2a-4c1b-4a3e-9f6d-2b8c5e1a7d3f");

    fn context() -> (WorkerContext, MockRepository) {
        let repo = MockRepository::new(NS);
        let ctx = WorkerContext {
            repo: Arc::new(repo.clone()),
            blob_store: Arc::new(MockBlobStore::new()),
            parser: Arc::new(MockParserClient::new("# Title\nbody")),
            embedder: Arc::new(MockEmbeddingClient::new(4)),
            chunker: MarkdownChunker::default(),
            chunker_name: "markdown-simple".to_string(),
            chunker_version: "1".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            embed_version: "1".to_string(),
            terminal_stage: Stage::Embedded,
        };
        (ctx, repo)
    }

    fn sample_leased(document_id: Uuid, user_id: &str, content_hash: &str, stage: Stage) -> LeasedJob {
        let now = chrono::Utc::now();
        let document = Document {
            document_id,
            user_id: user_id.to_string(),
            filename: "doc.pdf".to_string(),
            mime: "application/pdf".to_string(),
            byte_length: 10,
            content_hash: content_hash.to_string(),
            parsed_hash: None,
            raw_path: format!("files/user/{user_id}/raw/{content_hash}.pdf"),
            parsed_path: None,
            processing_status: stage.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        let job = Job {
            job_id: Uuid::new_v4(),
            document_id,
            stage,
            state: JobState::Working,
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
        LeasedJob { job, document }
    }

    #[tokio::test]
    async fn parsing_writes_blob_and_advances_to_parsed() {
        let (ctx, repo) = context();
        let document_id = ids::document_id(NS, "u1", "h1");
        let (document, job) = repo
            .insert_document(&Document {
                document_id,
                user_id: "u1".to_string(),
                filename: "doc.pdf".to_string(),
                mime: "application/pdf".to_string(),
                byte_length: 10,
                content_hash: "h1".to_string(),
                parsed_hash: None,
                raw_path: "files/user/u1/raw/h1.pdf".to_string(),
                parsed_path: None,
                processing_status: "job_validated".to_string(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        let leased = LeasedJob { job, document };

        run_parsing(&ctx, &leased).await.unwrap();

        let path = vellum_data::parsed_path("u1", document_id);
        let stored = ctx.blob_store.get(&path).await.unwrap();
        assert_eq!(stored, b"# Title\nbody");

        let updated = repo.get_job(leased.job.job_id).await.unwrap();
        assert_eq!(updated.stage, Stage::Parsed);
    }

    #[tokio::test]
    async fn parse_validation_rejects_empty_markdown_as_content_invariant() {
        let (ctx, _repo) = context();
        let document_id = Uuid::new_v4();
        let leased = sample_leased(document_id, "u1", "h1", Stage::Parsed);
        let path = vellum_data::parsed_path("u1", document_id);
        ctx.blob_store.put(&path, b"   \n  \n").await.unwrap();

        let err = run_parse_validation(&ctx, &leased).await.unwrap_err();
        assert_eq!(err.kind(), vellum_data::ErrorKind::ContentInvariant);
    }

    #[tokio::test]
    async fn chunking_requires_a_parsed_path() {
        let (ctx, _repo) = context();
        let document_id = Uuid::new_v4();
        let leased = sample_leased(document_id, "u1", "h1", Stage::ParseValidated);

        let err = run_chunking(&ctx, &leased).await.unwrap_err();
        assert_eq!(err.kind(), vellum_data::ErrorKind::ContentInvariant);
    }

    #[tokio::test]
    async fn embedding_rejects_a_document_with_no_chunks() {
        let (ctx, _repo) = context();
        let document_id = Uuid::new_v4();
        let leased = sample_leased(document_id, "u1", "h1", Stage::Chunked);

        let err = run_embedding(&ctx, &leased).await.unwrap_err();
        assert_eq!(err.kind(), vellum_data::ErrorKind::ContentInvariant);
    }
}
