//! Layered configuration for the gallerist ingestion daemon: defaults,
//! `.env`/environment, then CLI overrides, producing one validated [`Config`].

pub mod cli;
pub mod loader;
pub mod models;
pub mod validation;

pub use cli::Cli;
pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigSource};
pub use models::{
    ArchiveConfig, Config, DatabaseConfig, HealthConfig, IndexConfig, JobTrackerConfig,
    QueueConfig, RedisConfig, SchedulerConfig, StorageConfig,
};
