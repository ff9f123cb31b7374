/// Settings for the recurring scheduler's reconciliation loop (C10).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Reconciliation cadence (`scheduler.syncInterval`, default 300s, valid
    /// range 60–3600 per §6).
    pub sync_interval_secs: u64,
    /// Default cron expression used when seeding the "daily library scan"
    /// scheduled job (§6: "daily at 02:00").
    pub default_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 300,
            default_cron: "0 2 * * *".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub const MIN_SYNC_INTERVAL_SECS: u64 = 60;
    pub const MAX_SYNC_INTERVAL_SECS: u64 = 3600;

    pub fn is_valid(&self) -> bool {
        (Self::MIN_SYNC_INTERVAL_SECS..=Self::MAX_SYNC_INTERVAL_SECS)
            .contains(&self.sync_interval_secs)
    }
}
