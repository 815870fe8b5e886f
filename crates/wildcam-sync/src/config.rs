//! Configuration management

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/wildcam";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default interval between scheduled sweeps (hourly).
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3600;

/// Default number of files pulled per source in one run.
pub const DEFAULT_MAX_FILES_PER_SOURCE: usize = 10;

/// Default delay before the first scheduled sweep.
pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 5;

/// Default number of sources synced concurrently during a sweep.
pub const DEFAULT_SOURCE_PARALLELISM: usize = 4;

/// Default timeout for one listing or fetch request.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default timeout for one detection call.
pub const DEFAULT_DETECTION_TIMEOUT_SECS: u64 = 120;

/// Default detection service endpoint.
pub const DEFAULT_DETECTION_URL: &str = "http://localhost:8001/api/v1/detect";

/// User agent sent to camera feeds.
pub const DEFAULT_USER_AGENT: &str = concat!("wildcam-sync/", env!("CARGO_PKG_VERSION"));

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub http: HttpConfig,
    pub detection: DetectionConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Periodic sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    pub max_files_per_source: usize,
    pub source_parallelism: usize,
}

/// Outbound HTTP configuration for camera feeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Detection service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub url: String,
    pub timeout_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl SyncConfig {
    /// Load configuration from `.env`, the environment, and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = SyncConfig {
            database: DatabaseConfig {
                url: env_string("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
            },
            scheduler: SchedulerConfig {
                enabled: env_or("SYNC_SCHEDULER_ENABLED", true),
                interval_secs: env_or("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS),
                initial_delay_secs: env_or("SYNC_INITIAL_DELAY_SECS", DEFAULT_INITIAL_DELAY_SECS),
                max_files_per_source: env_or(
                    "SYNC_MAX_FILES_PER_SOURCE",
                    DEFAULT_MAX_FILES_PER_SOURCE,
                ),
                source_parallelism: env_or(
                    "SYNC_SOURCE_PARALLELISM",
                    DEFAULT_SOURCE_PARALLELISM,
                ),
            },
            http: HttpConfig {
                timeout_secs: env_or("SYNC_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
                user_agent: env_string("SYNC_USER_AGENT", DEFAULT_USER_AGENT),
            },
            detection: DetectionConfig {
                url: env_string("DETECTION_URL", DEFAULT_DETECTION_URL),
                timeout_secs: env_or("SYNC_DETECTION_TIMEOUT_SECS", DEFAULT_DETECTION_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.scheduler.interval_secs == 0 {
            anyhow::bail!("SYNC_INTERVAL_SECS must be greater than 0");
        }

        if self.scheduler.max_files_per_source == 0 {
            anyhow::bail!("SYNC_MAX_FILES_PER_SOURCE must be greater than 0");
        }

        if self.scheduler.source_parallelism == 0 {
            anyhow::bail!("SYNC_SOURCE_PARALLELISM must be greater than 0");
        }

        if self.http.timeout_secs == 0 || self.detection.timeout_secs == 0 {
            anyhow::bail!("HTTP and detection timeouts must be greater than 0");
        }

        if self.detection.url.is_empty() {
            anyhow::bail!("DETECTION_URL cannot be empty");
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn detection_timeout(&self) -> Duration {
        Duration::from_secs(self.detection.timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.scheduler.initial_delay_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
                initial_delay_secs: DEFAULT_INITIAL_DELAY_SECS,
                max_files_per_source: DEFAULT_MAX_FILES_PER_SOURCE,
                source_parallelism: DEFAULT_SOURCE_PARALLELISM,
            },
            http: HttpConfig {
                timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            detection: DetectionConfig {
                url: DEFAULT_DETECTION_URL.to_string(),
                timeout_secs: DEFAULT_DETECTION_TIMEOUT_SECS,
            },
        }
    }
}
