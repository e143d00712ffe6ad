//! Application state for Axum handlers.
//!
//! Holds the shared repository handle, the background worker (for the
//! health surface), and the few pipeline tunables the HTTP layer needs to
//! validate intake requests, all built once at startup and injected into
//! every handler.

use std::sync::Arc;

use uuid::Uuid;
use vellum_data::Repository;
use vellum_worker::Worker;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub worker: Arc<Worker>,
    /// Namespace used to derive document/chunk UUIDv5 identity.
    pub id_namespace: Uuid,
    /// Intake's soft cap on upload size, in bytes.
    pub max_file_size_bytes: u64,
}

impl AppState {
    #[must_use]
    pub fn new(
        repo: Arc<dyn Repository>,
        worker: Arc<Worker>,
        id_namespace: Uuid,
        max_file_size_bytes: u64,
    ) -> Self {
        Self { repo, worker, id_namespace, max_file_size_bytes }
    }
}
