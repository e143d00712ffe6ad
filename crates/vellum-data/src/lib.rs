//! Postgres-backed persisted state for the ingestion pipeline: documents,
//! jobs, and chunks.

pub mod error;
pub mod ids;
pub mod migrations;
pub mod mock;
pub mod models;
pub mod pool_manager;
pub mod repository;
pub mod traits;

pub use error::{DatabaseError, DatabaseErrorExt, DatabaseErrorMsgExt, DatabaseOperation, DatabaseResult};
pub use migrations::{run_migrations, wait_for_migrations};
pub use mock::MockRepository;
pub use models::*;
pub use pool_manager::{ConnectionStats, PoolConfig, PoolManager, PoolStats};
pub use repository::{DbRepository, failed_stage_for, parsed_path, raw_path};
pub use traits::Repository;
pub use vellum_config::DatabaseConfig;
