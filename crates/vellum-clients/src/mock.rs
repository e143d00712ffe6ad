//! Deterministic, fail-injectable test doubles for [`ParserClient`],
//! [`EmbeddingClient`], and [`BlobStore`], used by the worker's own test suite.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;
use vellum_common::ComponentHealth;

use crate::blob_store::BlobStore;
use crate::embedding::{EmbeddingClient, Vector};
use crate::error::{ClientError, ClientResult};
use crate::parser::ParserClient;

/// A parser double that returns a fixed markdown body, or a fixed error if
/// one has been injected via [`MockParserClient::fail_next`].
#[derive(Default)]
pub struct MockParserClient {
    markdown: String,
    fail_next: Mutex<Option<ClientError>>,
}

impl MockParserClient {
    #[must_use]
    pub fn new(markdown: impl Into<String>) -> Self {
        Self { markdown: markdown.into(), fail_next: Mutex::new(None) }
    }

    /// The next call to `convert` will return `error` instead of succeeding.
    pub fn fail_next(&self, error: ClientError) {
        *self.fail_next.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(error);
    }

    fn take_failure(&self) -> Option<ClientError> {
        self.fail_next.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take()
    }
}

#[async_trait]
impl ParserClient for MockParserClient {
    async fn convert(&self, _job_id: Uuid, _source_uri: &str) -> crate::error::ClientResult<String> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.markdown.clone())
    }

    async fn health(&self) -> ComponentHealth {
        ComponentHealth::Healthy
    }
}

/// An embedding double that returns a deterministic vector per input (filled
/// with the input's length, for easy assertion), or a fixed error if one has
/// been injected via [`MockEmbeddingClient::fail_next`].
pub struct MockEmbeddingClient {
    vector_dim: usize,
    fail_next: Mutex<Option<ClientError>>,
}

impl MockEmbeddingClient {
    #[must_use]
    pub fn new(vector_dim: usize) -> Self {
        Self { vector_dim, fail_next: Mutex::new(None) }
    }

    pub fn fail_next(&self, error: ClientError) {
        *self.fail_next.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(error);
    }

    fn take_failure(&self) -> Option<ClientError> {
        self.fail_next.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> crate::error::ClientResult<Vec<Vector>> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0_f32; self.vector_dim];
                if let Some(first) = vector.first_mut() {
                    *first = text.len() as f32;
                }
                vector
            })
            .collect())
    }

    async fn health(&self) -> ComponentHealth {
        ComponentHealth::Healthy
    }
}

/// An in-memory blob store double: a mutex-guarded map from logical path to
/// bytes, with the same failure-injection shape as the other doubles.
#[derive(Default)]
pub struct MockBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_next: Mutex<Option<ClientError>>,
}

impl MockBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: ClientError) {
        *self.fail_next.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(error);
    }

    fn take_failure(&self) -> Option<ClientError> {
        self.fail_next.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> ClientResult<()> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> ClientResult<Vec<u8>> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| ClientError::Storage { path: path.to_string(), message: "not found".to_string() })
    }

    async fn health(&self) -> ComponentHealth {
        ComponentHealth::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parser_mock_returns_fixed_markdown() {
        let client = MockParserClient::new("# hello");
        let result = client.convert(Uuid::new_v4(), "s3://doc").await.unwrap();
        assert_eq!(result, "# hello");
    }

    #[tokio::test]
    async fn parser_mock_honors_injected_failure() {
        let client = MockParserClient::new("# hello");
        client.fail_next(ClientError::CircuitOpen("parser"));
        let result = client.convert(Uuid::new_v4(), "s3://doc").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn embedding_mock_returns_one_vector_per_input_of_configured_dimension() {
        let client = MockEmbeddingClient::new(4);
        let texts = vec!["a".to_string(), "bb".to_string()];
        let vectors = client.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 4));
    }

    #[tokio::test]
    async fn blob_store_mock_round_trips_and_reports_not_found() {
        let store = MockBlobStore::new();
        store.put("files/user/u1/raw/abc.pdf", b"hello").await.unwrap();
        assert_eq!(store.get("files/user/u1/raw/abc.pdf").await.unwrap(), b"hello");
        assert!(store.get("files/user/u1/raw/missing.pdf").await.is_err());
    }
}
