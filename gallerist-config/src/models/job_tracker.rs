/// Settings for the job tracker's centralized monitor (C5).
#[derive(Debug, Clone)]
pub struct JobTrackerConfig {
    /// State-transition cadence (`jobTracker.monitorInterval`, default 5s).
    pub monitor_interval_secs: u64,
    /// Fraction of a stage's `total` allowed to fail before the job is marked
    /// `Failed` instead of `Completed` — the `stageFailureTolerance` policy
    /// knob left open by the spec (DESIGN.md open question #1). `0.0` means
    /// any failure at all fails the job.
    pub stage_failure_tolerance: f64,
}

impl Default for JobTrackerConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 5,
            stage_failure_tolerance: 0.0,
        }
    }
}
