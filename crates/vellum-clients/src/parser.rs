//! Parser client: converts a raw document to markdown via a remote
//! parsing service.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;
use vellum_common::ComponentHealth;
use vellum_config::ParserConfig;
use vellum_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitCallError};

use crate::error::{ClientError, ClientResult};

/// Status of a submitted parse job, as reported by the parser service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Accepted,
    Processing,
    Succeeded,
    Failed,
}

/// Response to [`ParserClient::submit`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SubmitResponse {
    pub parser_job_id: String,
    pub status: ParseStatus,
}

/// Response to [`ParserClient::status`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StatusResponse {
    pub status: ParseStatus,
    pub result_uri: Option<String>,
    pub error: Option<String>,
}

/// Capability set shared by the real HTTP-backed client and its test double.
#[async_trait]
pub trait ParserClient: Send + Sync {
    /// Submit the raw artifact at `source_uri` for conversion to markdown and
    /// poll until the remote reports a terminal status, returning the parsed
    /// markdown content.
    async fn convert(&self, job_id: Uuid, source_uri: &str) -> ClientResult<String>;

    /// Lightweight probe: the breaker's current state, not a remote call.
    async fn health(&self) -> ComponentHealth;
}

/// HTTP-backed parser client: `submit`/`status`/`health` over the remote
/// parsing service, guarded by a circuit breaker.
pub struct HttpParserClient {
    http: reqwest::Client,
    config: ParserConfig,
    breaker: CircuitBreaker,
}

impl HttpParserClient {
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            http,
            config,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Submit the raw artifact for conversion. Optionally registers a
    /// webhook the remote will call back on completion.
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] for a non-2xx response, [`ClientError::Network`]
    /// if the request couldn't be sent, or [`ClientError::CircuitOpen`] if the
    /// breaker is currently open.
    pub async fn submit(
        &self,
        job_id: Uuid,
        source_uri: &str,
        webhook_uri: Option<&str>,
    ) -> ClientResult<SubmitResponse> {
        let result = self
            .breaker
            .call(|| async {
                let mut request = self
                    .authorize(self.http.post(format!("{}/jobs", self.config.endpoint)))
                    .json(&serde_json::json!({
                        "job_id": job_id,
                        "source_uri": source_uri,
                        "webhook_uri": webhook_uri,
                    }));
                if let Some(secret) = &self.config.webhook_secret {
                    let timestamp = chrono::Utc::now().timestamp();
                    let signature = sign_webhook(secret, job_id, timestamp);
                    request = request
                        .header("X-Webhook-Signature", signature)
                        .header("X-Webhook-Timestamp", timestamp.to_string());
                }
                send_and_classify(request, "parser").await
            })
            .await;
        let body = unwrap_breaker(result, "parser")?;
        serde_json::from_str(&body).map_err(|err| ClientError::InvalidResponse {
            service: "parser",
            message: err.to_string(),
        })
    }

    /// Poll the remote for the current status of a previously submitted job.
    ///
    /// # Errors
    /// See [`Self::submit`].
    pub async fn status(&self, parser_job_id: &str) -> ClientResult<StatusResponse> {
        let result = self
            .breaker
            .call(|| async {
                let request =
                    self.authorize(self.http.get(format!("{}/jobs/{parser_job_id}", self.config.endpoint)));
                send_and_classify(request, "parser").await
            })
            .await;
        let body = unwrap_breaker(result, "parser")?;
        serde_json::from_str(&body).map_err(|err| ClientError::InvalidResponse {
            service: "parser",
            message: err.to_string(),
        })
    }

    async fn fetch_result(&self, result_uri: &str) -> ClientResult<String> {
        let result = self
            .breaker
            .call(|| async {
                let request = self.authorize(self.http.get(result_uri));
                send_and_classify(request, "parser").await
            })
            .await;
        unwrap_breaker(result, "parser")
    }
}

/// Poll interval between `status` calls while awaiting a parse result.
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);

#[async_trait]
impl ParserClient for HttpParserClient {
    async fn convert(&self, job_id: Uuid, source_uri: &str) -> ClientResult<String> {
        let submitted = self.submit(job_id, source_uri, None).await?;
        let mut status = submitted.status;
        let mut result_uri = None;

        while !matches!(status, ParseStatus::Succeeded | ParseStatus::Failed) {
            tokio::time::sleep(POLL_INTERVAL).await;
            let polled = self.status(&submitted.parser_job_id).await?;
            status = polled.status;
            result_uri = polled.result_uri;
            if let Some(message) = polled.error {
                return Err(ClientError::InvalidResponse { service: "parser", message });
            }
        }

        match (status, result_uri) {
            (ParseStatus::Succeeded, Some(uri)) => self.fetch_result(&uri).await,
            (ParseStatus::Succeeded, None) => Err(ClientError::InvalidResponse {
                service: "parser",
                message: "succeeded without a result_uri".to_string(),
            }),
            _ => Err(ClientError::InvalidResponse {
                service: "parser",
                message: "parse job failed".to_string(),
            }),
        }
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

/// Compute the HMAC-SHA256 webhook signature: `HMAC-SHA256(secret, "{job_id}:{timestamp}")`.
#[must_use]
pub fn sign_webhook(secret: &str, job_id: Uuid, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| {
        Hmac::<Sha256>::new_from_slice(&[]).expect("empty key is always valid for HMAC-SHA256")
    });
    mac.update(format!("{job_id}:{timestamp}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

async fn send_and_classify(request: reqwest::RequestBuilder, service: &'static str) -> ClientResult<String> {
    let response = request.send().await.map_err(|err| ClientError::Network {
        service,
        message: err.to_string(),
    })?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(ClientError::Http { service, status: status.as_u16(), body })
    }
}

fn unwrap_breaker<T>(result: Result<T, CircuitCallError<ClientError>>, service: &'static str) -> ClientResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(CircuitCallError::Open) => Err(ClientError::CircuitOpen(service)),
        Err(CircuitCallError::Inner(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_signature_is_deterministic() {
        let job_id = Uuid::new_v4();
        let a = sign_webhook("secret", job_id, 1_700_000_000);
        let b = sign_webhook("secret", job_id, 1_700_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn webhook_signature_differs_per_timestamp() {
        let job_id = Uuid::new_v4();
        let a = sign_webhook("secret", job_id, 1_700_000_000);
        let b = sign_webhook("secret", job_id, 1_700_000_001);
        assert_ne!(a, b);
    }
}
