pub mod error;

use std::env;
use std::path::PathBuf;

pub use error::{ConfigLoadError, Result};

use crate::models::{
    ArchiveConfig, Config, DatabaseConfig, HealthConfig, IndexConfig, JobTrackerConfig,
    QueueConfig, RedisConfig, SchedulerConfig, StorageConfig,
};

/// Where a loaded value came from, surfaced for `--print-config` style
/// diagnostics. Default-members of a layered config almost always want this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    Environment,
    Cli,
}

/// A loaded config value paired with its provenance.
#[derive(Debug, Clone)]
pub struct ConfigLoad<T> {
    pub value: T,
    pub source: ConfigSource,
}

/// Builds a validated [`Config`] from `.env` + process environment, falling
/// back to documented defaults. This intentionally does not touch the
/// network or the database — `ConfigLoader::load` is pure beyond reading the
/// environment, so it can run in tests without external services.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `.env` (if present) then builds and validates the [`Config`].
    pub fn load() -> Result<Config> {
        let _ = dotenvy::dotenv();
        Self::load_from_env()
    }

    /// Builds and validates the [`Config`] from the current process
    /// environment only, skipping `.env` discovery — used by tests that set
    /// variables directly.
    pub fn load_from_env() -> Result<Config> {
        let database = DatabaseConfig {
            url: env_or("GALLERIST_DATABASE_URL", "postgres://localhost/gallerist"),
            max_connections: env_parse_or("GALLERIST_DATABASE_MAX_CONNECTIONS", 10)?,
        };
        let redis = RedisConfig {
            url: env_or("GALLERIST_REDIS_URL", "redis://127.0.0.1:6379"),
        };
        let queue = QueueConfig {
            prefetch: env_parse_or("GALLERIST_QUEUE_PREFETCH", 8)?,
            max_retries: env_parse_or("GALLERIST_QUEUE_MAX_RETRIES", 5)?,
            retry_base_delay_ms: env_parse_or("GALLERIST_QUEUE_RETRY_BASE_MS", 500)?,
        };
        let job_tracker = JobTrackerConfig {
            monitor_interval_secs: env_parse_or("GALLERIST_JOB_TRACKER_MONITOR_INTERVAL_SECS", 5)?,
            stage_failure_tolerance: env_parse_or(
                "GALLERIST_JOB_TRACKER_STAGE_FAILURE_TOLERANCE",
                0.0,
            )?,
        };
        let scheduler = SchedulerConfig {
            sync_interval_secs: env_parse_or("GALLERIST_SCHEDULER_SYNC_INTERVAL_SECS", 300)?,
            default_cron: env_or("GALLERIST_SCHEDULER_DEFAULT_CRON", "0 2 * * *"),
        };
        let index = IndexConfig {
            rebuild_batch_size: env_parse_or("GALLERIST_INDEX_REBUILD_BATCH_SIZE", 100)?,
            thumb_ttl_secs: env_parse_or("GALLERIST_INDEX_THUMB_TTL_SECS", 30 * 24 * 60 * 60)?,
        };
        let archive = ArchiveConfig {
            max_entries: env_parse_opt("GALLERIST_ARCHIVE_MAX_ENTRIES")?,
            max_uncompressed_bytes: env_parse_opt("GALLERIST_ARCHIVE_MAX_UNCOMPRESSED_BYTES")?,
        };
        let storage = StorageConfig {
            cache_root: PathBuf::from(env_or("GALLERIST_CACHE_ROOT", "./data/cache")),
            thumbnail_root: PathBuf::from(env_or("GALLERIST_THUMBNAIL_ROOT", "./data/thumbnails")),
            cache_folder_soft_cap_bytes: env_parse_or(
                "GALLERIST_CACHE_FOLDER_SOFT_CAP_BYTES",
                50 * 1024 * 1024 * 1024,
            )?,
        };
        let health = HealthConfig {
            host: env_or("GALLERIST_HEALTH_HOST", "0.0.0.0"),
            port: env_parse_or("GALLERIST_HEALTH_PORT", 8787)?,
        };

        let config = Config {
            database,
            redis,
            queue,
            job_tracker,
            scheduler,
            index,
            archive,
            storage,
            health,
        };

        crate::validation::validate(&config)?;
        Ok(config)
    }
}

fn env_or(key: &'static str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigLoadError::Invalid {
            key,
            value: raw,
            reason: "could not parse value",
        }),
        Err(_) => Ok(default),
    }
}

fn env_parse_opt<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigLoadError::Invalid {
                key,
                value: raw,
                reason: "could not parse value",
            }),
        Err(_) => Ok(None),
    }
}
