//! Shared, cheaply-clonable handles to the worker's external collaborators.

use std::sync::Arc;

use vellum_chunker::MarkdownChunker;
use vellum_clients::{BlobStore, EmbeddingClient, ParserClient};
use vellum_data::{Repository, Stage};

/// Everything a stage handler needs to act on a leased job.
///
/// Built once at startup from [`vellum_config::ApplicationConfig`] and
/// shared across every lease iteration; cloning is cheap since every field
/// is either an `Arc` or `Copy`/small owned data.
#[derive(Clone)]
pub struct WorkerContext {
    pub repo: Arc<dyn Repository>,
    pub blob_store: Arc<dyn BlobStore>,
    pub parser: Arc<dyn ParserClient>,
    pub embedder: Arc<dyn EmbeddingClient>,
    pub chunker: MarkdownChunker,
    pub chunker_name: String,
    pub chunker_version: String,
    pub embed_model: String,
    pub embed_version: String,
    /// Stage at which a job is considered fully processed.
    pub terminal_stage: Stage,
}
