//! Blob store adapter: read/write of raw and parsed artifacts by
//! logical path. The job store owns path assignment (document rows carry
//! their own `raw_path`/`parsed_path`); this adapter only moves bytes.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use vellum_common::ComponentHealth;

use crate::error::{ClientError, ClientResult};

/// Capability set for reading and writing artifacts by logical path.
/// Paths are always relative, forward-slash-separated strings such as
/// `files/user/<user_id>/raw/<doc_hash>.pdf` — never filesystem-absolute.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `path`, creating any parent directories. Overwrites
    /// whatever was there before, matching the stage handlers' expectation
    /// that re-execution with identical content is a safe no-op.
    async fn put(&self, path: &str, bytes: &[u8]) -> ClientResult<()>;

    /// Read the bytes previously written at `path`.
    async fn get(&self, path: &str) -> ClientResult<Vec<u8>>;

    /// Lightweight probe: whether the backing store is reachable at all.
    async fn health(&self) -> ComponentHealth;
}

/// Local-filesystem-backed blob store, rooted at a configured directory.
/// Stands in for an object store (S3-compatible or similar) in deployments
/// that don't need one; the trait boundary is what the worker depends on.
pub struct LocalFsBlobStore {
    root: PathBuf,
}

impl LocalFsBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a logical path against the store root, rejecting anything
    /// that could escape it (absolute paths, `..` components).
    fn resolve(&self, path: &str) -> ClientResult<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(ClientError::Storage {
                path: path.to_string(),
                message: "path must be relative and contain no parent-directory segments".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalFsBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> ClientResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|err| ClientError::Storage {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        }
        tokio::fs::write(&full, bytes).await.map_err(|err| ClientError::Storage {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    async fn get(&self, path: &str) -> ClientResult<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|err| ClientError::Storage {
            path: path.to_string(),
            message: err.to_string(),
        })
    }

    async fn health(&self) -> ComponentHealth {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => ComponentHealth::Healthy,
            _ => ComponentHealth::Unhealthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_through_a_temp_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFsBlobStore::new(dir.path());
        store.put("files/user/u1/raw/abc123.pdf", b"%PDF-1.4").await.unwrap();
        let bytes = store.get("files/user/u1/raw/abc123.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn rejects_paths_that_escape_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFsBlobStore::new(dir.path());
        let result = store.put("../escape.txt", b"nope").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_on_missing_path_is_a_storage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalFsBlobStore::new(dir.path());
        let result = store.get("files/user/u1/raw/missing.pdf").await;
        assert!(matches!(result, Err(ClientError::Storage { .. })));
    }

    #[tokio::test]
    async fn health_is_unhealthy_when_root_does_not_exist() {
        let store = LocalFsBlobStore::new("/nonexistent/does/not/exist");
        assert_eq!(store.health().await, ComponentHealth::Unhealthy);
    }
}
