//! The background worker: a single lease→dispatch→handle loop per instance,
//! protected by a worker-level circuit breaker independent of the per-service
//! breakers already inside the parser and embedding clients.
//!
//! # Future extraction
//!
//! This module has zero web framework dependencies, so it can run as its own
//! binary alongside (or instead of) the HTTP API:
//!
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() {
//!     let worker = Worker::new(context, worker_config);
//!     worker.run().await;
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;
use vellum_common::ComponentHealth;
use vellum_data::{ErrorKind, LastError, Stage, failed_stage_for};
use vellum_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitCallError, CircuitState};

use crate::context::WorkerContext;
use crate::error::WorkerError;
use crate::stages;

/// Active stages the worker leases and dispatches on, oldest-eligible-first.
const ACTIVE_STAGES: [Stage; 4] =
    [Stage::JobValidated, Stage::Parsed, Stage::ParseValidated, Stage::Chunked];

/// Tunables for the worker loop, independent of the per-service client config.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between empty leases.
    pub poll_interval: Duration,
    /// Cap on per-job retry count before a failure is deadlettered outright.
    pub max_retries: u32,
    /// Base of the exponential backoff schedule applied to retryable failures.
    pub retry_base_delay: Duration,
    /// Consecutive worker-level failures before the worker-level breaker opens.
    pub circuit_failure_threshold: usize,
    /// Recovery timeout for the worker-level breaker.
    pub circuit_recovery_timeout: Duration,
}

impl WorkerConfig {
    /// Derive worker-loop tunables from the shared application configuration.
    #[must_use]
    pub fn from_pipeline(pipeline: &vellum_config::PipelineConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(pipeline.poll_interval_ms),
            max_retries: pipeline.max_retries,
            retry_base_delay: Duration::from_millis(pipeline.retry_base_delay_ms),
            circuit_failure_threshold: pipeline.worker_circuit_failure_threshold,
            circuit_recovery_timeout: Duration::from_secs(pipeline.worker_circuit_recovery_timeout_secs),
        }
    }
}

/// Health of every component the worker depends on, plus its own run state.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerHealth {
    pub status: ComponentHealth,
    pub worker_id: String,
    pub running: bool,
    pub circuit_open: bool,
    pub components: WorkerComponentHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerComponentHealth {
    pub job_store: ComponentHealth,
    pub blob_store: ComponentHealth,
    pub parser: ComponentHealth,
    pub embedding: ComponentHealth,
}

/// A single polling worker instance. Multiple instances (same or different
/// process) may run concurrently against the same job store: `lease_job`'s
/// `SELECT ... FOR UPDATE SKIP LOCKED` makes that safe.
pub struct Worker {
    id: String,
    ctx: WorkerContext,
    config: WorkerConfig,
    breaker: CircuitBreaker,
    running: Arc<AtomicBool>,
}

impl Worker {
    #[must_use]
    pub fn new(id: impl Into<String>, ctx: WorkerContext, config: WorkerConfig) -> Self {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_failure_threshold,
            recovery_timeout: config.circuit_recovery_timeout,
        });
        Self { id: id.into(), ctx, config, breaker, running: Arc::new(AtomicBool::new(false)) }
    }

    /// A clone of the flag that [`Self::run`] checks between iterations.
    /// Flip it to `false` to ask the loop to stop after its current job.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run the lease→dispatch→handle loop until `shutdown_handle()` is
    /// cleared. Shutdown is checked only between stage handlers and during
    /// the empty-lease sleep, never mid-handler.
    #[tracing::instrument(skip(self), fields(worker_id = %self.id))]
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(worker_id = %self.id, "worker started");

        while self.running.load(Ordering::SeqCst) {
            match self.tick().await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(self.config.poll_interval).await,
                Err(CircuitCallError::Open) => {
                    tracing::warn!(worker_id = %self.id, "worker circuit open, backing off");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                Err(CircuitCallError::Inner(())) => {}
            }
        }

        tracing::info!(worker_id = %self.id, "worker stopped");
    }

    /// Signal the loop to stop after its current iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Lease and process a single job, if one is eligible. Returns `Ok(true)`
    /// if a job was processed, `Ok(false)` if the queue was empty, and
    /// `Err` if the worker-level breaker tripped or refused the attempt.
    async fn tick(&self) -> Result<bool, CircuitCallError<()>> {
        self.breaker
            .call(|| async {
                let leased = self.ctx.repo.lease_job(&ACTIVE_STAGES).await.map_err(|err| {
                    tracing::error!(worker_id = %self.id, error = %err, "failed to lease job");
                })?;

                let Some(leased) = leased else {
                    return Ok(false);
                };

                let correlation_id = Uuid::new_v4();
                self.process(leased, correlation_id).await;
                Ok(true)
            })
            .await
    }

    #[tracing::instrument(skip(self, leased), fields(job_id = %leased.job.job_id, %correlation_id))]
    async fn process(&self, leased: vellum_data::LeasedJob, correlation_id: Uuid) {
        let job_id = leased.job.job_id;
        let stage = leased.job.stage;
        let retry_count = leased.job.retry_count;

        let (result, phase) = match stage {
            Stage::JobValidated => (stages::run_parsing(&self.ctx, &leased).await, Stage::Parsing),
            Stage::Parsed => (stages::run_parse_validation(&self.ctx, &leased).await, Stage::Parsing),
            Stage::ParseValidated => (stages::run_chunking(&self.ctx, &leased).await, Stage::Chunking),
            Stage::Chunked => (stages::run_embedding(&self.ctx, &leased).await, Stage::Embedding),
            other => {
                tracing::error!(%job_id, stage = %other, "leased a job in a non-active stage");
                return;
            }
        };

        match result {
            Ok(()) => {
                tracing::info!(%job_id, %correlation_id, %stage, "stage completed");
            }
            Err(err) => {
                tracing::warn!(%job_id, %correlation_id, %stage, error = %err, "stage failed");
                self.fail(job_id, phase, retry_count, &err, correlation_id).await;
            }
        }
    }

    async fn fail(&self, job_id: Uuid, phase: Stage, retry_count: i32, err: &WorkerError, correlation_id: Uuid) {
        let kind = err.kind();
        let exhausted = u32::try_from(retry_count.max(0)).unwrap_or(u32::MAX) + 1 >= self.config.max_retries;
        let deadletter = !kind.is_retryable() || exhausted;

        let effective_kind = if deadletter && kind.is_retryable() { ErrorKind::RetriesExhausted } else { kind };
        let retry_at = (!deadletter).then(|| {
            let backoff = 2_u32.saturating_pow(retry_count.max(0).unsigned_abs());
            Utc::now() + self.config.retry_base_delay * backoff
        });

        let last_error = LastError {
            kind: effective_kind,
            message: err.to_string(),
            occurred_at: Utc::now(),
            retry_at,
        };

        if let Err(store_err) = self
            .ctx
            .repo
            .fail_job(job_id, failed_stage_for(phase), last_error, deadletter)
            .await
        {
            tracing::error!(%job_id, %correlation_id, error = %store_err, "failed to record job failure");
        }
    }

    /// Aggregate health of the worker and every component it depends on.
    pub async fn health(&self) -> WorkerHealth {
        let job_store = match self.ctx.repo.health_check().await {
            Ok(()) => ComponentHealth::Healthy,
            Err(_) => ComponentHealth::Unhealthy,
        };
        let blob_store = self.ctx.blob_store.health().await;
        let parser = self.ctx.parser.health().await;
        let embedding = self.ctx.embedder.health().await;

        let circuit_open = matches!(self.breaker.state().await, CircuitState::Open { .. });
        let all_healthy = [job_store, blob_store, parser, embedding]
            .iter()
            .all(|component| *component == ComponentHealth::Healthy);

        WorkerHealth {
            status: if circuit_open || !all_healthy { ComponentHealth::Unhealthy } else { ComponentHealth::Healthy },
            worker_id: self.id.clone(),
            running: self.running.load(Ordering::SeqCst),
            circuit_open,
            components: WorkerComponentHealth { job_store, blob_store, parser, embedding },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vellum_chunker::MarkdownChunker;
    use vellum_clients::{ClientError, MockBlobStore, MockEmbeddingClient, MockParserClient};
    use vellum_data::{Document, JobState, MockRepository, Repository};

    use super::*;

    const NS: Uuid = uuid::uuid!("7d9f9e2a-4c1b-4a3e-9f6d-2b8c5e1a7d3f");

    fn worker_with(parser: MockParserClient, embedder: MockEmbeddingClient) -> (Worker, MockRepository) {
        let repo = MockRepository::new(NS);
        let ctx = WorkerContext {
            repo: Arc::new(repo.clone()),
            blob_store: Arc::new(MockBlobStore::new()),
            parser: Arc::new(parser),
            embedder: Arc::new(embedder),
            chunker: MarkdownChunker::default(),
            chunker_name: "markdown-simple".to_string(),
            chunker_version: "1".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            embed_version: "1".to_string(),
            terminal_stage: Stage::Embedded,
        };
        let config = WorkerConfig {
            poll_interval: Duration::from_millis(1),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1),
            circuit_failure_threshold: 5,
            circuit_recovery_timeout: Duration::from_secs(60),
        };
        (Worker::new("test-worker", ctx, config), repo)
    }

    async fn sample_document(repo: &MockRepository, user_id: &str, content_hash: &str) -> Document {
        let document_id = vellum_data::ids::document_id(NS, user_id, content_hash);
        let now = chrono::Utc::now();
        let (document, _job) = repo
            .insert_document(&Document {
                document_id,
                user_id: user_id.to_string(),
                filename: "doc.pdf".to_string(),
                mime: "application/pdf".to_string(),
                byte_length: 10,
                content_hash: content_hash.to_string(),
                parsed_hash: None,
                raw_path: format!("files/user/{user_id}/raw/{content_hash}.pdf"),
                parsed_path: None,
                processing_status: "job_validated".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        document
    }

    #[tokio::test]
    async fn tick_advances_a_job_validated_job_to_parsed() {
        let (worker, repo) = worker_with(MockParserClient::new("# Title\nbody"), MockEmbeddingClient::new(4));
        let document = sample_document(&repo, "u1", "h1").await;

        let processed = worker.tick().await.unwrap();
        assert!(processed);

        let jobs = repo.all_jobs();
        let job = jobs.iter().find(|j| j.document_id == document.document_id).unwrap();
        assert_eq!(job.stage, Stage::Parsed);
        assert_eq!(job.state, JobState::Queued);
    }

    #[tokio::test]
    async fn tick_returns_false_when_queue_is_empty() {
        let (worker, _repo) = worker_with(MockParserClient::new("# T\nb"), MockEmbeddingClient::new(4));
        let processed = worker.tick().await.unwrap();
        assert!(!processed);
    }

    #[tokio::test]
    async fn a_retryable_failure_is_scheduled_for_retry_not_deadlettered() {
        let parser = MockParserClient::new("# T\nb");
        parser.fail_next(ClientError::Network { service: "parser", message: "timeout".to_string() });
        let (worker, repo) = worker_with(parser, MockEmbeddingClient::new(4));
        sample_document(&repo, "u1", "h1").await;

        worker.tick().await.unwrap();

        let job = repo.all_jobs().into_iter().next().unwrap();
        assert_eq!(job.state, JobState::Retryable);
        assert_eq!(job.stage, Stage::JobValidated);
        let last_error = job.last_error.unwrap();
        assert_eq!(last_error.kind, ErrorKind::TransientRemote);
        assert!(last_error.retry_at.is_some());
    }

    #[tokio::test]
    async fn a_fatal_failure_is_deadlettered_immediately() {
        let parser = MockParserClient::new("# T\nb");
        parser.fail_next(ClientError::InvalidResponse { service: "parser", message: "bad shape".to_string() });
        let (worker, repo) = worker_with(parser, MockEmbeddingClient::new(4));
        sample_document(&repo, "u1", "h1").await;

        worker.tick().await.unwrap();

        let job = repo.all_jobs().into_iter().next().unwrap();
        assert_eq!(job.state, JobState::Deadletter);
        assert_eq!(job.stage, Stage::FailedParse);
    }

    #[tokio::test]
    async fn retries_exhausted_deadletters_even_a_retryable_kind() {
        let (worker, repo) = worker_with(MockParserClient::new("# T\nb"), MockEmbeddingClient::new(4));
        sample_document(&repo, "u1", "h1").await;
        let job_id = repo.all_jobs()[0].job_id;

        for _ in 0..3 {
            repo.fail_job(
                job_id,
                Stage::Parsing,
                LastError {
                    kind: ErrorKind::TransientRemote,
                    message: "boom".to_string(),
                    occurred_at: Utc::now(),
                    retry_at: Some(Utc::now() - chrono::Duration::seconds(1)),
                },
                false,
            )
            .await
            .unwrap();
        }

        let job = repo.get_job(job_id).await.unwrap();
        assert_eq!(job.retry_count, 3);

        worker.fail(job_id, Stage::Parsing, job.retry_count, &WorkerError::Client(ClientError::Network { service: "parser", message: "x".to_string() }), Uuid::new_v4()).await;

        let job = repo.get_job(job_id).await.unwrap();
        assert_eq!(job.state, JobState::Deadletter);
        assert_eq!(job.last_error.unwrap().kind, ErrorKind::RetriesExhausted);
    }

    #[tokio::test]
    async fn health_reports_healthy_when_every_component_is_up() {
        let (worker, repo) = worker_with(MockParserClient::new("# T\nb"), MockEmbeddingClient::new(4));
        sample_document(&repo, "u1", "h1").await;

        let health = worker.health().await;
        assert_eq!(health.status, ComponentHealth::Healthy);
        assert!(!health.circuit_open);
    }
}
