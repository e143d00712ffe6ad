//! Connection pool management with read/write separation
//!
//! This module provides separated connection pools for different operation types,
//! improving database performance and preventing resource contention.

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use vellum_config::DatabaseConfig;

/// Extension trait for saturating cast from usize to u32
trait SaturatingCast {
    fn saturating_cast(self) -> u32;
}

impl SaturatingCast for usize {
    fn saturating_cast(self) -> u32 {
        u32::try_from(self).unwrap_or(u32::MAX)
    }
}

/// Configuration for connection pools
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum connections for write pool
    pub write_pool_size: u32,
    /// Maximum connections for read pool
    pub read_pool_size: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Idle timeout in seconds
    pub idle_timeout: u64,
    /// Maximum lifetime in seconds
    pub max_lifetime: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            write_pool_size: 10,
            read_pool_size: 20,
            connect_timeout: 30,
            idle_timeout: 600,
            max_lifetime: 1800,
        }
    }
}

/// Manages the write and read connection pools backing the job store.
///
/// Worker stage handlers and the dedup service use the write pool for every
/// mutation (job leases, document/chunk writes); the job-inspection and
/// health surfaces use the read pool so a burst of status polling never
/// starves a worker of a write connection.
#[derive(Clone)]
#[allow(clippy::struct_field_names)]
pub struct PoolManager {
    /// Pool for write operations (leasing, stage transitions, chunk writes)
    write_pool: PgPool,
    /// Pool for read operations (job inspection, health checks)
    read_pool: PgPool,
}

impl PoolManager {
    /// Create a new pool manager with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Database URL is malformed or contains invalid parameters
    /// - Database server is unreachable or refuses connections
    /// - Authentication fails due to invalid credentials
    /// - Either connection pool (write or read) fails to connect
    /// - Connection timeout is exceeded for either pool
    pub async fn new(db_config: &DatabaseConfig, config: PoolConfig) -> Result<Self> {
        let base_options = db_config.connect_options().application_name("vellum");

        let write_pool = PgPoolOptions::new()
            .max_connections(config.write_pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .max_lifetime(Duration::from_secs(config.max_lifetime))
            .connect_with(base_options.clone())
            .await
            .context("Failed to create write pool")?;

        let read_pool = PgPoolOptions::new()
            .max_connections(config.read_pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .max_lifetime(Duration::from_secs(config.max_lifetime))
            .connect_with(base_options)
            .await
            .context("Failed to create read pool")?;

        Ok(Self {
            write_pool,
            read_pool,
        })
    }

    /// Get the write pool for lease and mutation operations
    pub const fn write_pool(&self) -> &PgPool {
        &self.write_pool
    }

    /// Get the read pool for query operations
    pub const fn read_pool(&self) -> &PgPool {
        &self.read_pool
    }

    /// Create with default configuration, reading `DatabaseConfig` from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or pool creation fails
    /// (see [`PoolManager::new`]).
    pub async fn from_env() -> Result<Self> {
        let db_config = DatabaseConfig::from_env();
        Self::new(&db_config, PoolConfig::default()).await
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            write_pool: ConnectionStats {
                size: self.write_pool.size(),
                idle: self.write_pool.num_idle().saturating_cast(),
                max: self.write_pool.options().get_max_connections(),
            },
            read_pool: ConnectionStats {
                size: self.read_pool.size(),
                idle: self.read_pool.num_idle().saturating_cast(),
                max: self.read_pool.options().get_max_connections(),
            },
        }
    }

    /// Close both pools
    pub async fn close(&self) {
        self.write_pool.close().await;
        self.read_pool.close().await;
    }
}

/// Statistics for a connection pool
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// Current number of connections
    pub size: u32,
    /// Number of idle connections
    pub idle: u32,
    /// Maximum connections allowed
    pub max: u32,
}

/// Combined statistics for both pools
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub write_pool: ConnectionStats,
    pub read_pool: ConnectionStats,
}

impl PoolStats {
    /// Get total connections across both pools
    pub const fn total_connections(&self) -> u32 {
        self.write_pool.size.saturating_add(self.read_pool.size)
    }

    /// Get total idle connections
    pub const fn total_idle(&self) -> u32 {
        self.write_pool.idle.saturating_add(self.read_pool.idle)
    }

    /// Get utilization percentage
    #[allow(clippy::cast_precision_loss)] // Acceptable precision loss for utilization percentage
    pub fn utilization(&self) -> f32 {
        let total = self.total_connections() as f32;
        let idle = self.total_idle() as f32;
        if total > 0.0 {
            ((total - idle) / total) * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.write_pool_size, 10);
        assert_eq!(config.read_pool_size, 20);
    }

    #[test]
    fn test_pool_stats_calculations() {
        let stats = PoolStats {
            write_pool: ConnectionStats {
                size: 5,
                idle: 2,
                max: 10,
            },
            read_pool: ConnectionStats {
                size: 10,
                idle: 5,
                max: 20,
            },
        };

        assert_eq!(stats.total_connections(), 15);
        assert_eq!(stats.total_idle(), 7);
        assert!((stats.utilization() - 53.33).abs() < 0.1);
    }
}
