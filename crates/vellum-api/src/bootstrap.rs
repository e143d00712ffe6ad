//! Application bootstrap and service initialization.
//!
//! Separates configuration and dependency wiring from the main entry point:
//! one function per collaborator, and `initialize_app_state` to compose them
//! in dependency order.

use std::sync::Arc;

use vellum_chunker::MarkdownChunker;
use vellum_clients::{HttpEmbeddingClient, HttpParserClient, LocalFsBlobStore};
use vellum_config::ApplicationConfig;
use vellum_data::{DbRepository, PoolConfig, PoolManager, Repository, Stage};
use vellum_worker::{Worker, WorkerConfig, WorkerContext};

use crate::AppState;

pub type BootstrapResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Initialize the database connection pools.
///
/// # Errors
/// Returns an error if the database is unreachable or misconfigured.
pub async fn setup_database(config: &ApplicationConfig) -> BootstrapResult<Arc<dyn Repository>> {
    tracing::info!("initializing database connection pool");
    let pools = PoolManager::new(&config.database, PoolConfig::default()).await?;
    let repo = Arc::new(DbRepository::new(pools, config.pipeline.id_namespace)) as Arc<dyn Repository>;
    Ok(repo)
}

/// Build the worker context shared by every lease iteration.
#[must_use]
pub fn build_worker_context(config: &ApplicationConfig, repo: Arc<dyn Repository>) -> WorkerContext {
    let blob_store = Arc::new(LocalFsBlobStore::new(config.blob_store.root_dir.clone()));
    let parser = Arc::new(HttpParserClient::new(config.parser.clone()));
    let embedder = Arc::new(HttpEmbeddingClient::new(config.embedding.clone()));
    let chunker = MarkdownChunker::new(config.chunker.max_lines_per_chunk);
    let terminal_stage: Stage =
        config.pipeline.terminal_stage.parse().unwrap_or(Stage::Embedded);

    WorkerContext {
        repo,
        blob_store,
        parser,
        embedder,
        chunker,
        chunker_name: config.chunker.name.clone(),
        chunker_version: config.chunker.version.clone(),
        embed_model: config.embedding.model.clone(),
        embed_version: config.embedding.version.clone(),
        terminal_stage,
    }
}

/// Initialize all services and create application state, starting the
/// background worker loop as a detached task.
///
/// # Errors
/// Returns an error if any dependency fails to initialize.
pub async fn initialize_app_state(config: &ApplicationConfig) -> BootstrapResult<AppState> {
    let repo = setup_database(config).await?;
    let ctx = build_worker_context(config, Arc::clone(&repo));
    let worker_config = WorkerConfig::from_pipeline(&config.pipeline);
    let worker = Arc::new(Worker::new("vellum-api-embedded", ctx, worker_config));

    let worker_handle = Arc::clone(&worker);
    tokio::spawn(async move { worker_handle.run().await });

    let state = AppState::new(
        repo,
        worker,
        config.pipeline.id_namespace,
        config.intake.max_file_size_bytes,
    );

    tracing::info!("application state initialized");
    Ok(state)
}
