//! Centralized, typed configuration for the ingestion pipeline.
//!
//! Every tunable that affects the worker, the job store, the chunker, or the
//! external clients is represented as a typed, documented field with a safe
//! default and an environment-variable override. Nothing reads `std::env`
//! outside this crate.

pub mod error;
pub mod profile;
pub mod source;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use profile::Profile;
pub use source::{ConfigurationLoader, ConfigurationSource, EnvironmentSource, TomlFileSource};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;
use validation::Validate;

// --- Database defaults ---
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "vellum";
const DEFAULT_DB_USER: &str = "vellum";
const DEFAULT_DB_PASSWORD: &str = "vellum_dev_password";
const DEFAULT_DB_SSL_MODE: &str = "prefer";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_DB_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_DB_IDLE_TIMEOUT_SECONDS: u64 = 600;

// --- API / health-check surface defaults ---
const DEFAULT_API_HOST: &str = "0.0.0.0";
const DEFAULT_API_PORT: u16 = 8080;
const DEFAULT_API_TIMEOUT_SECONDS: u64 = 30;

// --- Telemetry defaults ---
const DEFAULT_TELEMETRY_ENABLED: bool = false;
const DEFAULT_TRACING_LEVEL: &str = "info";
const DEFAULT_TRACE_SAMPLE_RATE: f64 = 1.0;
const DEFAULT_TELEMETRY_SERVICE_NAME: &str = "vellum-worker";
const DEFAULT_TELEMETRY_ENVIRONMENT: &str = "development";

// --- Pipeline / worker defaults ---
const DEFAULT_TERMINAL_STAGE: &str = "embedded";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 3_000;
const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: usize = 5;
const DEFAULT_CIRCUIT_RECOVERY_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WORKER_CIRCUIT_FAILURE_THRESHOLD: usize = 5;
const DEFAULT_WORKER_CIRCUIT_RECOVERY_TIMEOUT_SECS: u64 = 60;

// --- Embedding defaults (text-embedding-3-small) ---
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBED_VERSION: &str = "1";
const DEFAULT_VECTOR_DIM: usize = 1536;
const DEFAULT_EMBED_MAX_BATCH_SIZE: usize = 64;
const DEFAULT_EMBED_MAX_BATCH_TOKENS: usize = 8_000;
const DEFAULT_EMBED_REQUESTS_PER_MINUTE: usize = 3_000;
const DEFAULT_EMBED_TOKENS_PER_MINUTE: usize = 1_000_000;
const DEFAULT_EMBED_TIMEOUT_SECONDS: u64 = 120;

// --- Parser defaults ---
const DEFAULT_PARSER_TIMEOUT_SECONDS: u64 = 120;

// --- Chunker defaults (markdown-simple v1) ---
const DEFAULT_CHUNKER_NAME: &str = "markdown-simple";
const DEFAULT_CHUNKER_VERSION: &str = "1";
const DEFAULT_CHUNK_MAX_LINES: usize = 20;

// --- Blob store defaults ---
const DEFAULT_BLOB_STORE_ROOT: &str = "./data/blobs";

// --- Intake defaults ---
const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 25 * 1024 * 1024;
const HARD_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;
/// Namespace UUID for content-addressed document and chunk ids (fixed once, never rotated).
const DEFAULT_ID_NAMESPACE: Uuid = uuid::uuid!("7d9f9e2a-4c1b-4a3e-9f6d-2b8c5e1a7d3f");

/// Top level configuration for the ingestion pipeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApplicationConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
    pub embedding: EmbeddingConfig,
    pub parser: ParserConfig,
    pub chunker: ChunkerConfig,
    pub intake: IntakeConfig,
    pub blob_store: BlobStoreConfig,
}

impl ApplicationConfig {
    /// Load configuration from environment variables with safe defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig::from_env(),
            api: ApiConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            parser: ParserConfig::from_env(),
            chunker: ChunkerConfig::from_env(),
            intake: IntakeConfig::from_env(),
            blob_store: BlobStoreConfig::from_env(),
        }
    }

    /// Load configuration, applying profile-specific overrides on top of `from_env`.
    #[must_use]
    pub fn with_profile(profile: Profile) -> Self {
        let mut config = Self::from_env();
        match profile {
            Profile::Test => {
                config.database.max_connections = 2;
                config.pipeline.poll_interval_ms = 10;
                config.telemetry.enabled = false;
            }
            Profile::Development => {
                config.telemetry.tracing_level = "debug".to_string();
            }
            Profile::Staging | Profile::Production => {
                config.telemetry.enabled = true;
            }
        }
        config
    }
}

impl Validate for ApplicationConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.api.validate()?;
        self.telemetry.validate()?;
        self.pipeline.validate()?;
        self.embedding.validate()?;
        self.parser.validate()?;
        self.chunker.validate()?;
        self.intake.validate()?;
        self.blob_store.validate()?;
        Ok(())
    }
}

/// Comprehensive `PostgreSQL` configuration backing the job store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let host = std::env::var("VELLUM_DATABASE_HOST")
            .or_else(|_| std::env::var("DB_HOST"))
            .unwrap_or_else(|_| DEFAULT_DB_HOST.to_string());
        let port = std::env::var("VELLUM_DATABASE_PORT")
            .or_else(|_| std::env::var("DB_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_PORT);
        let database = std::env::var("VELLUM_DATABASE_NAME")
            .or_else(|_| std::env::var("DB_NAME"))
            .unwrap_or_else(|_| DEFAULT_DB_NAME.to_string());
        let username = std::env::var("VELLUM_DATABASE_USERNAME")
            .or_else(|_| std::env::var("DB_USER"))
            .unwrap_or_else(|_| DEFAULT_DB_USER.to_string());
        let password = std::env::var("VELLUM_DATABASE_PASSWORD")
            .or_else(|_| std::env::var("DB_PASSWORD"))
            .unwrap_or_else(|_| {
                tracing::warn!(
                    "Using default database password - set VELLUM_DATABASE_PASSWORD in any non-development environment"
                );
                DEFAULT_DB_PASSWORD.to_string()
            });
        let ssl_mode = std::env::var("VELLUM_DATABASE_SSL_MODE")
            .unwrap_or_else(|_| DEFAULT_DB_SSL_MODE.to_string());
        let max_connections = std::env::var("VELLUM_DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let min_connections = std::env::var("VELLUM_DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_MIN_CONNECTIONS);
        let timeout_seconds = std::env::var("VELLUM_DATABASE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_TIMEOUT_SECONDS);
        let idle_timeout_seconds = std::env::var("VELLUM_DATABASE_IDLE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_IDLE_TIMEOUT_SECONDS);
        let auto_migrate = std::env::var("VELLUM_DATABASE_AUTO_MIGRATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        let url = std::env::var("VELLUM_DATABASE_URL").unwrap_or_else(|_| {
            format!("postgresql://{username}:{password}@{host}:{port}/{database}")
        });

        Self {
            url,
            host,
            port,
            database,
            username,
            password,
            ssl_mode,
            max_connections,
            min_connections,
            timeout_seconds,
            idle_timeout_seconds,
            auto_migrate,
        }
    }

    fn parse_ssl_mode(&self) -> PgSslMode {
        match self.ssl_mode.as_str() {
            "disable" => PgSslMode::Disable,
            "require" => PgSslMode::Require,
            _ => PgSslMode::Prefer,
        }
    }

    /// Build `PostgreSQL` connection options without exposing the password in a URL.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(self.parse_ssl_mode())
    }

    /// Create a connection pool sized for a single logical role (read, write, or analytics).
    ///
    /// # Errors
    /// Returns an error if the pool cannot establish its initial connection.
    pub async fn create_pool_with(&self, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(self.min_connections.min(max_connections))
            .acquire_timeout(Duration::from_secs(self.timeout_seconds))
            .idle_timeout(Duration::from_secs(self.idle_timeout_seconds))
            .connect_with(self.connect_options())
            .await
    }

    /// Create a pool using the configured default connection count.
    ///
    /// # Errors
    /// Returns an error if the pool cannot establish its initial connection.
    pub async fn create_pool(&self) -> Result<PgPool, sqlx::Error> {
        self.create_pool_with(self.max_connections).await
    }

    /// Connection summary safe to log (never includes the password).
    #[must_use]
    pub fn safe_connection_string(&self) -> String {
        format!(
            "{}@{}:{}/{} (ssl: {})",
            self.username, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.url, "database.url")?;
        validation::validate_range(
            u64::from(self.max_connections),
            1,
            1000,
            "database.max_connections",
        )?;
        validation::validate_range(self.timeout_seconds, 1, 3600, "database.timeout_seconds")?;
        Ok(())
    }
}

/// Health-check / operational surface configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

impl ApiConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let host = std::env::var("VELLUM_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
        let port = std::env::var("VELLUM_API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_PORT);
        let timeout_seconds = std::env::var("VELLUM_API_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECONDS);
        Self {
            host,
            port,
            timeout_seconds,
        }
    }
}

impl Validate for ApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.host, "api.host")?;
        validation::validate_port(self.port, "api.port")?;
        validation::validate_range(self.timeout_seconds, 1, 3600, "api.timeout_seconds")?;
        Ok(())
    }
}

/// Tracing / metrics configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub tracing_level: String,
    pub service_name: String,
    pub environment: String,
}

impl TelemetryConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var("VELLUM_TELEMETRY_ENABLED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TELEMETRY_ENABLED);
        let otlp_endpoint = std::env::var("VELLUM_TELEMETRY_OTLP_ENDPOINT").ok();
        let tracing_level = std::env::var("VELLUM_TELEMETRY_TRACING_LEVEL")
            .unwrap_or_else(|_| DEFAULT_TRACING_LEVEL.to_string());
        let service_name = std::env::var("VELLUM_TELEMETRY_SERVICE_NAME")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_SERVICE_NAME.to_string());
        let environment = std::env::var("VELLUM_TELEMETRY_ENVIRONMENT")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_ENVIRONMENT.to_string());
        Self {
            enabled,
            otlp_endpoint,
            tracing_level,
            service_name,
            environment,
        }
    }
}

impl Validate for TelemetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.service_name, "telemetry.service_name")?;
        validation::validate_non_empty(&self.environment, "telemetry.environment")?;
        if let Some(ref endpoint) = self.otlp_endpoint {
            validation::validate_url(endpoint, "telemetry.otlp_endpoint")?;
        }
        match self.tracing_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Generic {
                message: format!("invalid tracing level: {}", self.tracing_level),
            }),
        }
    }
}

/// Job state machine and worker loop configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineConfig {
    /// Stage at which a job transitions to `done`.
    pub terminal_stage: String,
    /// Sleep between empty leases, in milliseconds.
    pub poll_interval_ms: u64,
    /// Cap on per-job retry count before a job is deadlettered.
    pub max_retries: u32,
    /// Base of the exponential backoff schedule, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Consecutive failures before a per-service circuit breaker opens.
    pub circuit_failure_threshold: usize,
    /// Seconds before an open circuit breaker allows a half-open probe.
    pub circuit_recovery_timeout_secs: u64,
    /// Consecutive worker-level exceptions before the worker-level breaker opens.
    pub worker_circuit_failure_threshold: usize,
    /// Recovery timeout for the worker-level breaker, in seconds.
    pub worker_circuit_recovery_timeout_secs: u64,
    /// Fixed namespace used for all UUIDv5 document/chunk identity.
    pub id_namespace: Uuid,
}

impl PipelineConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let terminal_stage = std::env::var("VELLUM_PIPELINE_TERMINAL_STAGE")
            .unwrap_or_else(|_| DEFAULT_TERMINAL_STAGE.to_string());
        let poll_interval_ms = std::env::var("VELLUM_PIPELINE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let max_retries = std::env::var("VELLUM_PIPELINE_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let retry_base_delay_ms = std::env::var("VELLUM_PIPELINE_RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS);
        let circuit_failure_threshold = std::env::var("VELLUM_PIPELINE_CIRCUIT_FAILURE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CIRCUIT_FAILURE_THRESHOLD);
        let circuit_recovery_timeout_secs =
            std::env::var("VELLUM_PIPELINE_CIRCUIT_RECOVERY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CIRCUIT_RECOVERY_TIMEOUT_SECS);
        let worker_circuit_failure_threshold =
            std::env::var("VELLUM_PIPELINE_WORKER_CIRCUIT_FAILURE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WORKER_CIRCUIT_FAILURE_THRESHOLD);
        let worker_circuit_recovery_timeout_secs =
            std::env::var("VELLUM_PIPELINE_WORKER_CIRCUIT_RECOVERY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WORKER_CIRCUIT_RECOVERY_TIMEOUT_SECS);
        let id_namespace = std::env::var("VELLUM_PIPELINE_ID_NAMESPACE")
            .ok()
            .and_then(|s| Uuid::parse_str(&s).ok())
            .unwrap_or(DEFAULT_ID_NAMESPACE);

        Self {
            terminal_stage,
            poll_interval_ms,
            max_retries,
            retry_base_delay_ms,
            circuit_failure_threshold,
            circuit_recovery_timeout_secs,
            worker_circuit_failure_threshold,
            worker_circuit_recovery_timeout_secs,
            id_namespace,
        }
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.terminal_stage, "pipeline.terminal_stage")?;
        validation::validate_range(self.poll_interval_ms, 1, 600_000, "pipeline.poll_interval_ms")?;
        validation::validate_range(u64::from(self.max_retries), 0, 100, "pipeline.max_retries")?;
        validation::validate_range(
            self.circuit_failure_threshold as u64,
            1,
            1000,
            "pipeline.circuit_failure_threshold",
        )?;
        Ok(())
    }
}

/// Embedding client configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub version: String,
    pub vector_dim: usize,
    pub max_batch_size: usize,
    pub max_batch_tokens: usize,
    pub requests_per_minute: usize,
    pub tokens_per_minute: usize,
    pub timeout_seconds: u64,
}

impl EmbeddingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let endpoint = std::env::var("VELLUM_EMBEDDING_ENDPOINT")
            .unwrap_or_else(|_| "https://api.openai.com/v1/embeddings".to_string());
        let api_key = std::env::var("VELLUM_EMBEDDING_API_KEY").ok();
        let model =
            std::env::var("VELLUM_EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let version = std::env::var("VELLUM_EMBEDDING_VERSION")
            .unwrap_or_else(|_| DEFAULT_EMBED_VERSION.to_string());
        let vector_dim = std::env::var("VELLUM_EMBEDDING_VECTOR_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_VECTOR_DIM);
        let max_batch_size = std::env::var("VELLUM_EMBEDDING_MAX_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBED_MAX_BATCH_SIZE);
        let max_batch_tokens = std::env::var("VELLUM_EMBEDDING_MAX_BATCH_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBED_MAX_BATCH_TOKENS);
        let requests_per_minute = std::env::var("VELLUM_EMBEDDING_REQUESTS_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBED_REQUESTS_PER_MINUTE);
        let tokens_per_minute = std::env::var("VELLUM_EMBEDDING_TOKENS_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBED_TOKENS_PER_MINUTE);
        let timeout_seconds = std::env::var("VELLUM_EMBEDDING_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_EMBED_TIMEOUT_SECONDS);

        Self {
            endpoint,
            api_key,
            model,
            version,
            vector_dim,
            max_batch_size,
            max_batch_tokens,
            requests_per_minute,
            tokens_per_minute,
            timeout_seconds,
        }
    }
}

impl Validate for EmbeddingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.endpoint, "embedding.endpoint")?;
        validation::validate_non_empty(&self.model, "embedding.model")?;
        validation::validate_range(self.vector_dim as u64, 1, 10_000, "embedding.vector_dim")?;
        validation::validate_range(
            self.max_batch_size as u64,
            1,
            10_000,
            "embedding.max_batch_size",
        )?;
        Ok(())
    }
}

/// Parser client configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ParserConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub timeout_seconds: u64,
}

impl ParserConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let endpoint = std::env::var("VELLUM_PARSER_ENDPOINT")
            .unwrap_or_else(|_| "https://parser.internal.example.com".to_string());
        let api_key = std::env::var("VELLUM_PARSER_API_KEY").ok();
        let webhook_secret = std::env::var("VELLUM_PARSER_WEBHOOK_SECRET").ok();
        let timeout_seconds = std::env::var("VELLUM_PARSER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PARSER_TIMEOUT_SECONDS);
        Self {
            endpoint,
            api_key,
            webhook_secret,
            timeout_seconds,
        }
    }
}

impl Validate for ParserConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.endpoint, "parser.endpoint")?;
        validation::validate_range(self.timeout_seconds, 1, 3600, "parser.timeout_seconds")?;
        Ok(())
    }
}

/// Markdown chunker configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChunkerConfig {
    pub name: String,
    pub version: String,
    pub max_lines_per_chunk: usize,
}

impl ChunkerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let name =
            std::env::var("VELLUM_CHUNKER_NAME").unwrap_or_else(|_| DEFAULT_CHUNKER_NAME.to_string());
        let version = std::env::var("VELLUM_CHUNKER_VERSION")
            .unwrap_or_else(|_| DEFAULT_CHUNKER_VERSION.to_string());
        let max_lines_per_chunk = std::env::var("VELLUM_CHUNKER_MAX_LINES_PER_CHUNK")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHUNK_MAX_LINES);
        Self {
            name,
            version,
            max_lines_per_chunk,
        }
    }
}

impl Validate for ChunkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.name, "chunker.name")?;
        validation::validate_non_empty(&self.version, "chunker.version")?;
        validation::validate_range(
            self.max_lines_per_chunk as u64,
            1,
            10_000,
            "chunker.max_lines_per_chunk",
        )?;
        Ok(())
    }
}

/// Intake validation limits.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IntakeConfig {
    pub max_file_size_bytes: u64,
    pub hard_max_file_size_bytes: u64,
}

impl IntakeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let max_file_size_bytes = std::env::var("VELLUM_INTAKE_MAX_FILE_SIZE_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES);
        let hard_max_file_size_bytes = std::env::var("VELLUM_INTAKE_HARD_MAX_FILE_SIZE_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(HARD_MAX_FILE_SIZE_BYTES);
        Self {
            max_file_size_bytes,
            hard_max_file_size_bytes,
        }
    }
}

impl Validate for IntakeConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_file_size_bytes == 0 || self.max_file_size_bytes > self.hard_max_file_size_bytes
        {
            return Err(ConfigError::Generic {
                message: format!(
                    "max_file_size_bytes ({}) must be > 0 and <= hard_max_file_size_bytes ({})",
                    self.max_file_size_bytes, self.hard_max_file_size_bytes
                ),
            });
        }
        Ok(())
    }
}

/// Blob store adapter configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlobStoreConfig {
    /// Root directory the local-filesystem blob store resolves logical paths against.
    pub root_dir: String,
}

impl BlobStoreConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let root_dir = std::env::var("VELLUM_BLOB_STORE_ROOT")
            .unwrap_or_else(|_| DEFAULT_BLOB_STORE_ROOT.to_string());
        Self { root_dir }
    }
}

impl Validate for BlobStoreConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.root_dir, "blob_store.root_dir")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_produces_valid_defaults() {
        let config = ApplicationConfig::from_env();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.terminal_stage, "embedded");
        assert_eq!(config.embedding.vector_dim, 1536);
    }

    #[test]
    fn with_profile_test_shrinks_pool_and_poll_interval() {
        let config = ApplicationConfig::with_profile(Profile::Test);
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.pipeline.poll_interval_ms, 10);
    }

    #[test]
    fn intake_rejects_cap_above_hard_limit() {
        let mut config = IntakeConfig::from_env();
        config.max_file_size_bytes = config.hard_max_file_size_bytes + 1;
        assert!(config.validate().is_err());
    }
}
