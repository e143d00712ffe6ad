//! Embedding client: batched text → vector conversion, rate-limited and
//! circuit-broken.

use async_trait::async_trait;
use vellum_common::ComponentHealth;
use vellum_config::EmbeddingConfig;
use vellum_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitCallError, RateLimiter, estimate_tokens};

use crate::error::{ClientError, ClientResult};

/// A single embedded vector.
pub type Vector = Vec<f32>;

/// Capability set shared by the real HTTP-backed client and its test double.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> ClientResult<Vec<Vector>>;

    /// Lightweight probe: the breaker's current state, not a remote call.
    async fn health(&self) -> ComponentHealth;
}

#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(serde::Deserialize)]
struct EmbedResponseItem {
    embedding: Vector,
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseItem>,
}

/// HTTP-backed embedding client: micro-batches requests, rate-limits them,
/// and guards the remote call behind a circuit breaker.
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
}

impl HttpEmbeddingClient {
    #[must_use]
    pub fn new(config: EmbeddingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        let limiter = RateLimiter::new(config.requests_per_minute, config.tokens_per_minute);
        Self {
            http,
            config,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            limiter,
        }
    }

    fn micro_batches(&self, texts: &[String]) -> Vec<Vec<String>> {
        let mut batches = Vec::new();
        let mut current = Vec::new();
        let mut current_tokens = 0usize;

        for text in texts {
            let tokens = estimate_tokens(text);
            let would_overflow_count = current.len() + 1 > self.config.max_batch_size;
            let would_overflow_tokens = current_tokens + tokens > self.config.max_batch_tokens;
            if !current.is_empty() && (would_overflow_count || would_overflow_tokens) {
                batches.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            current_tokens += tokens;
            current.push(text.clone());
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    async fn embed_batch(&self, batch: &[String]) -> ClientResult<Vec<Vector>> {
        let estimated_tokens: usize = batch.iter().map(|t| estimate_tokens(t)).sum();
        self.limiter.acquire(estimated_tokens).await;

        let result = self
            .breaker
            .call(|| async {
                let mut request = self
                    .http
                    .post(&self.config.endpoint)
                    .json(&EmbedRequest { model: &self.config.model, input: batch });
                if let Some(key) = &self.config.api_key {
                    request = request.bearer_auth(key);
                }
                let response = request.send().await.map_err(|err| ClientError::Network {
                    service: "embedding",
                    message: err.to_string(),
                })?;
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if status.is_success() {
                    Ok(body)
                } else {
                    Err(ClientError::Http { service: "embedding", status: status.as_u16(), body })
                }
            })
            .await;

        let body = match result {
            Ok(body) => body,
            Err(CircuitCallError::Open) => return Err(ClientError::CircuitOpen("embedding")),
            Err(CircuitCallError::Inner(err)) => return Err(err),
        };

        let parsed: EmbedResponse = serde_json::from_str(&body).map_err(|err| ClientError::InvalidResponse {
            service: "embedding",
            message: err.to_string(),
        })?;

        if parsed.data.len() != batch.len() {
            return Err(ClientError::ContentInvariant(format!(
                "embedding count {} does not match input count {}",
                parsed.data.len(),
                batch.len()
            )));
        }

        for item in &parsed.data {
            if item.embedding.len() != self.config.vector_dim {
                return Err(ClientError::ContentInvariant(format!(
                    "embedding dimension {} does not match configured dimension {}",
                    item.embedding.len(),
                    self.config.vector_dim
                )));
            }
        }

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> ClientResult<Vec<Vector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in self.micro_batches(texts) {
            let batch_vectors = self.embed_batch(&batch).await?;
            vectors.extend(batch_vectors);
        }
        Ok(vectors)
    }

    async fn health(&self) -> ComponentHealth {
        match self.breaker.state().await {
            vellum_resilience::CircuitState::Closed | vellum_resilience::CircuitState::HalfOpen => {
                ComponentHealth::Healthy
            }
            vellum_resilience::CircuitState::Open { .. } => ComponentHealth::Unhealthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            endpoint: "http://localhost/embed".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            version: "1".to_string(),
            vector_dim: 1536,
            max_batch_size: 2,
            max_batch_tokens: 100,
            requests_per_minute: 1000,
            tokens_per_minute: 1_000_000,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn micro_batches_split_on_count() {
        let client = HttpEmbeddingClient::new(config());
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let batches = client.micro_batches(&texts);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);
    }

    #[test]
    fn micro_batches_split_on_token_ceiling() {
        let mut cfg = config();
        cfg.max_batch_size = 100;
        cfg.max_batch_tokens = 10;
        let client = HttpEmbeddingClient::new(cfg);
        let texts = vec!["x".repeat(20), "y".repeat(20)];
        let batches = client.micro_batches(&texts);
        assert_eq!(batches.len(), 2);
    }
}
