use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CollectionId, JobId, LibraryId};

/// The background-job type tag. New consumer kinds append here; the job
/// monitor filters on `{Pending, InProgress}` regardless of type, so a job
/// type that forgets to register itself here never gets stuck (see the
/// monitor-filter note in the job tracker design).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    LibraryScan,
    CollectionScan,
    ResumeCollection,
    CacheCleanup,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses are sticky: the monitor never transitions out of them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Per-stage progress counters. Only ever mutated through atomic increments
/// on the owning document (see `gallerist_core::catalog`); never
/// read-modify-write.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct StageCounters {
    pub status: StageStatus,
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub skipped: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StageCounters {
    /// Invariant 1 of §8: `completed + failed + skipped <= total`.
    pub fn within_bounds(&self) -> bool {
        self.completed + self.failed + self.skipped <= self.total
    }

    /// A stage is done observing new work once every unit has been accounted
    /// for; `total == 0` counts as immediately done.
    pub fn is_accounted_for(&self) -> bool {
        self.total == 0 || self.completed + self.failed + self.skipped >= self.total
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub collection_id: Option<CollectionId>,
    pub library_id: Option<LibraryId>,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub stages: HashMap<String, StageCounters>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BackgroundJob {
    /// Whether every stage has accounted for its declared total — the
    /// condition the monitor uses to move a job out of `InProgress`. A job
    /// with no stages yet is never considered accounted for: §4.5 requires
    /// `total > 0` before a job can complete, and an empty `stages` map
    /// means no stage has been initialized at all.
    pub fn all_stages_accounted_for(&self) -> bool {
        !self.stages.is_empty() && self.stages.values().all(|s| s.is_accounted_for())
    }

    /// Whether any stage's failure rate exceeds `tolerance` (a fraction of
    /// `total`, the `stageFailureTolerance` policy knob from DESIGN.md).
    pub fn exceeds_failure_tolerance(&self, tolerance: f64) -> bool {
        self.stages.values().any(|s| {
            if s.total == 0 {
                return false;
            }
            (s.failed as f64) / (s.total as f64) > tolerance
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_stage_is_immediately_accounted_for() {
        let stage = StageCounters::default();
        assert!(stage.is_accounted_for());
        assert!(stage.within_bounds());
    }

    #[test]
    fn stage_not_accounted_for_until_total_reached() {
        let stage = StageCounters { status: StageStatus::InProgress, total: 10, completed: 9, failed: 0, skipped: 0 };
        assert!(!stage.is_accounted_for());
        let done = StageCounters { completed: 10, ..stage };
        assert!(done.is_accounted_for());
    }

    #[test]
    fn failure_tolerance_zero_trips_on_any_failure() {
        let mut job = BackgroundJob {
            id: crate::ids::Id::generate(),
            job_type: JobType::CollectionScan,
            collection_id: None,
            library_id: None,
            status: JobStatus::InProgress,
            started_at: None,
            completed_at: None,
            message: None,
            stages: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        job.stages.insert(
            "thumbnail".into(),
            StageCounters { status: StageStatus::InProgress, total: 10, completed: 9, failed: 1, skipped: 0 },
        );
        assert!(job.exceeds_failure_tolerance(0.0));
        assert!(!job.exceeds_failure_tolerance(0.5));
    }
}
