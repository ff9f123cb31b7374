use std::path::PathBuf;

pub mod archive;
pub mod index;
pub mod job_tracker;
pub mod queue;
pub mod scheduler;
pub mod storage;

pub use archive::ArchiveConfig;
pub use index::IndexConfig;
pub use job_tracker::JobTrackerConfig;
pub use queue::QueueConfig;
pub use scheduler::SchedulerConfig;
pub use storage::StorageConfig;

/// Top-level validated configuration for the gallerist daemon.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub queue: QueueConfig,
    pub job_tracker: JobTrackerConfig,
    pub scheduler: SchedulerConfig,
    pub index: IndexConfig,
    pub archive: ArchiveConfig,
    pub storage: StorageConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn cache_root(&self) -> &PathBuf {
        &self.storage.cache_root
    }

    pub fn thumbnail_root(&self) -> &PathBuf {
        &self.storage.thumbnail_root
    }
}
