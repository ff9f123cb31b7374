use std::sync::Arc;

use gallerist_model::{BackgroundJob, JobId, JobStatus};

use crate::catalog::{CatalogGateway, StageCounterField};
use crate::error::Result;

/// Thin, crate-facing wrapper over [`CatalogGateway`]'s job operations.
/// Consumers call this instead of the gateway directly so stage bookkeeping
/// reads the same way everywhere regardless of which stage it updates.
#[derive(Clone)]
pub struct JobTracker {
    catalog: Arc<dyn CatalogGateway>,
}

impl JobTracker {
    pub fn new(catalog: Arc<dyn CatalogGateway>) -> Self {
        Self { catalog }
    }

    pub async fn create(&self, job: &BackgroundJob) -> Result<BackgroundJob> {
        self.catalog.create_job(job).await
    }

    pub async fn get(&self, job_id: JobId) -> Result<Option<BackgroundJob>> {
        self.catalog.get_job(job_id).await
    }

    /// Declares how many units a stage will process. Called once, before any
    /// work is published, so the monitor never sees a `total` that's still
    /// growing underneath it.
    pub async fn init_stage_total(&self, job_id: JobId, stage: &str, total: i64) -> Result<()> {
        self.catalog.init_stage_total(job_id, stage, total).await
    }

    pub async fn mark_completed(&self, job_id: JobId, stage: &str) -> Result<()> {
        self.catalog
            .increment_stage(job_id, stage, StageCounterField::Completed, 1)
            .await
    }

    pub async fn mark_failed(&self, job_id: JobId, stage: &str) -> Result<()> {
        self.catalog
            .increment_stage(job_id, stage, StageCounterField::Failed, 1)
            .await
    }

    pub async fn mark_skipped(&self, job_id: JobId, stage: &str) -> Result<()> {
        self.catalog
            .increment_stage(job_id, stage, StageCounterField::Skipped, 1)
            .await
    }

    pub async fn cancel(&self, job_id: JobId) -> Result<()> {
        self.catalog
            .transition_job_status(job_id, JobStatus::Cancelled, None)
            .await
    }
}
