use crate::loader::ConfigLoadError;
use crate::models::Config;

/// Guard rails that must hold before the daemon starts. These mirror the
/// valid-range notes in the operational-flags table (§6) rather than any
/// business invariant — a bad value here means misconfiguration, not bad
/// runtime data.
pub fn validate(config: &Config) -> Result<(), ConfigLoadError> {
    if !config.scheduler.is_valid() {
        return Err(ConfigLoadError::GuardRail(format!(
            "scheduler.sync_interval_secs must be within {}..={}, got {}",
            crate::models::SchedulerConfig::MIN_SYNC_INTERVAL_SECS,
            crate::models::SchedulerConfig::MAX_SYNC_INTERVAL_SECS,
            config.scheduler.sync_interval_secs
        )));
    }
    if !(0.0..=1.0).contains(&config.job_tracker.stage_failure_tolerance) {
        return Err(ConfigLoadError::GuardRail(format!(
            "job_tracker.stage_failure_tolerance must be within 0.0..=1.0, got {}",
            config.job_tracker.stage_failure_tolerance
        )));
    }
    if config.queue.prefetch == 0 {
        return Err(ConfigLoadError::GuardRail(
            "queue.prefetch must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use std::path::PathBuf;

    fn base_config() -> Config {
        Config {
            database: DatabaseConfig { url: "postgres://x".into(), max_connections: 5 },
            redis: RedisConfig { url: "redis://x".into() },
            queue: QueueConfig::default(),
            job_tracker: JobTrackerConfig::default(),
            scheduler: SchedulerConfig::default(),
            index: IndexConfig::default(),
            archive: ArchiveConfig::default(),
            storage: StorageConfig {
                cache_root: PathBuf::from("/tmp/cache"),
                thumbnail_root: PathBuf::from("/tmp/thumbs"),
                cache_folder_soft_cap_bytes: 1,
            },
            health: HealthConfig { host: "0.0.0.0".into(), port: 1 },
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn rejects_sync_interval_below_minimum() {
        let mut config = base_config();
        config.scheduler.sync_interval_secs = 10;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_tolerance_outside_unit_range() {
        let mut config = base_config();
        config.job_tracker.stage_failure_tolerance = 1.5;
        assert!(validate(&config).is_err());
    }
}
