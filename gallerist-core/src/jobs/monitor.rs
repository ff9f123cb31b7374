use std::sync::Arc;
use std::time::Duration;

use gallerist_config::JobTrackerConfig;
use gallerist_model::JobStatus;
use tracing::{debug, info, warn};

use crate::catalog::CatalogGateway;
use crate::error::Result;

/// The single long-lived monitor that replaces a per-job supervisor task
/// (C5). Every `monitor_interval_secs` it inspects every job in
/// `{Pending, InProgress}` and transitions it to `Completed`/`Failed` once
/// all of its stages are accounted for.
pub struct Monitor {
    catalog: Arc<dyn CatalogGateway>,
    config: JobTrackerConfig,
}

impl Monitor {
    pub fn new(catalog: Arc<dyn CatalogGateway>, config: JobTrackerConfig) -> Self {
        Self { catalog, config }
    }

    /// Runs forever, polling on `monitor_interval_secs`. Intended to be
    /// spawned as its own Tokio task by `gallerist-server`.
    pub async fn run(&self) -> ! {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.monitor_interval_secs));
        loop {
            interval.tick().await;
            if let Err(err) = self.sweep().await {
                warn!(error = %err, "job monitor sweep failed");
            }
        }
    }

    /// One pass over every active job. Exposed separately from [`Self::run`]
    /// so tests can drive it deterministically.
    pub async fn sweep(&self) -> Result<()> {
        let jobs = self.catalog.find_active_jobs().await?;
        debug!(count = jobs.len(), "monitor sweep over active jobs");

        for job in jobs {
            if !job.all_stages_accounted_for() {
                continue;
            }

            let next_status = if job.exceeds_failure_tolerance(self.config.stage_failure_tolerance) {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            };

            info!(job_id = %job.id, status = ?next_status, "job stages fully accounted for");
            self.catalog
                .transition_job_status(job.id, next_status, None)
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use gallerist_model::{
        BackgroundJob, CacheFolder, CacheImageEmbedded, Collection, CollectionId, ImageEmbedded,
        JobId, JobType, Library, LibraryId, RunStatus, ScheduledJob, ScheduledJobId,
        ScheduledJobRun, ScheduledJobRunId, StageCounters, ThumbnailEmbedded,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::catalog::{CollectionFilter, LibraryStatsDelta, StageCounterField};

    #[derive(Default)]
    struct FakeCatalog {
        jobs: Mutex<Vec<BackgroundJob>>,
        transitions: Mutex<Vec<(JobId, JobStatus)>>,
    }

    fn make_job(id: JobId, stages: HashMap<String, StageCounters>) -> BackgroundJob {
        BackgroundJob {
            id,
            job_type: JobType::CollectionScan,
            collection_id: None,
            library_id: None,
            status: JobStatus::InProgress,
            started_at: None,
            completed_at: None,
            message: None,
            stages,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl CatalogGateway for FakeCatalog {
        async fn create_library(&self, library: &Library) -> Result<Library> {
            Ok(library.clone())
        }
        async fn get_library(&self, _id: LibraryId) -> Result<Option<Library>> {
            Ok(None)
        }
        async fn increment_library_stats(
            &self,
            _id: LibraryId,
            _delta: LibraryStatsDelta,
        ) -> Result<()> {
            Ok(())
        }
        async fn mark_library_scanned(&self, _id: LibraryId) -> Result<()> {
            Ok(())
        }
        async fn create_collection(&self, collection: &Collection) -> Result<Collection> {
            Ok(collection.clone())
        }
        async fn get_collection(&self, _id: CollectionId) -> Result<Option<Collection>> {
            Ok(None)
        }
        async fn find_collection_by_path(
            &self,
            _library_id: LibraryId,
            _path: &str,
        ) -> Result<Option<Collection>> {
            Ok(None)
        }
        async fn push_image(&self, _collection_id: CollectionId, _image: ImageEmbedded) -> Result<()> {
            Ok(())
        }
        async fn push_thumbnail(
            &self,
            _collection_id: CollectionId,
            _thumbnail: ThumbnailEmbedded,
        ) -> Result<()> {
            Ok(())
        }
        async fn push_cache_image(
            &self,
            _collection_id: CollectionId,
            _cache_image: CacheImageEmbedded,
        ) -> Result<()> {
            Ok(())
        }
        async fn clear_derivatives(&self, _collection_id: CollectionId) -> Result<()> {
            Ok(())
        }
        async fn find_collections_paged(
            &self,
            _filter: &CollectionFilter,
            _skip: i64,
            _limit: i64,
        ) -> Result<Vec<Collection>> {
            Ok(vec![])
        }
        async fn count_collections(&self, _filter: &CollectionFilter) -> Result<i64> {
            Ok(0)
        }
        async fn create_job(&self, job: &BackgroundJob) -> Result<BackgroundJob> {
            self.jobs.lock().unwrap().push(job.clone());
            Ok(job.clone())
        }
        async fn get_job(&self, id: JobId) -> Result<Option<BackgroundJob>> {
            Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned())
        }
        async fn init_stage_total(&self, _job_id: JobId, _stage: &str, _total: i64) -> Result<()> {
            Ok(())
        }
        async fn increment_stage(
            &self,
            _job_id: JobId,
            _stage: &str,
            _field: StageCounterField,
            _delta: i64,
        ) -> Result<()> {
            Ok(())
        }
        async fn transition_job_status(
            &self,
            job_id: JobId,
            status: JobStatus,
            _message: Option<String>,
        ) -> Result<()> {
            self.transitions.lock().unwrap().push((job_id, status));
            Ok(())
        }
        async fn find_active_jobs(&self) -> Result<Vec<BackgroundJob>> {
            Ok(self.jobs.lock().unwrap().clone())
        }
        async fn list_enabled_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
            Ok(vec![])
        }
        async fn get_scheduled_job(&self, _id: ScheduledJobId) -> Result<Option<ScheduledJob>> {
            Ok(None)
        }
        async fn update_scheduled_job_after_run(
            &self,
            _id: ScheduledJobId,
            _success: bool,
            _next_run_at: Option<chrono::DateTime<Utc>>,
        ) -> Result<()> {
            Ok(())
        }
        async fn create_scheduled_job_run(&self, run: &ScheduledJobRun) -> Result<ScheduledJobRun> {
            Ok(run.clone())
        }
        async fn complete_scheduled_job_run(
            &self,
            _run_id: ScheduledJobRunId,
            _status: RunStatus,
            _error_message: Option<String>,
        ) -> Result<()> {
            Ok(())
        }
        async fn list_active_cache_folders(&self) -> Result<Vec<CacheFolder>> {
            Ok(vec![])
        }
        async fn record_cache_file(
            &self,
            _folder_id: gallerist_model::CacheFolderId,
            _collection_id: CollectionId,
            _bytes: i64,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn completes_a_job_once_every_stage_is_accounted_for() {
        let job_id = JobId::generate();
        let mut stages = HashMap::new();
        stages.insert(
            "thumbnail".to_string(),
            StageCounters {
                status: gallerist_model::StageStatus::InProgress,
                total: 3,
                completed: 3,
                failed: 0,
                skipped: 0,
            },
        );
        let catalog = Arc::new(FakeCatalog::default());
        catalog.jobs.lock().unwrap().push(make_job(job_id, stages));

        let monitor = Monitor::new(catalog.clone(), JobTrackerConfig::default());
        monitor.sweep().await.unwrap();

        let transitions = catalog.transitions.lock().unwrap();
        assert_eq!(transitions.as_slice(), &[(job_id, JobStatus::Completed)]);
    }

    #[tokio::test]
    async fn fails_a_job_beyond_the_configured_failure_tolerance() {
        let job_id = JobId::generate();
        let mut stages = HashMap::new();
        stages.insert(
            "thumbnail".to_string(),
            StageCounters {
                status: gallerist_model::StageStatus::InProgress,
                total: 10,
                completed: 8,
                failed: 2,
                skipped: 0,
            },
        );
        let catalog = Arc::new(FakeCatalog::default());
        catalog.jobs.lock().unwrap().push(make_job(job_id, stages));

        let monitor = Monitor::new(catalog.clone(), JobTrackerConfig::default());
        monitor.sweep().await.unwrap();

        let transitions = catalog.transitions.lock().unwrap();
        assert_eq!(transitions.as_slice(), &[(job_id, JobStatus::Failed)]);
    }

    #[tokio::test]
    async fn leaves_a_job_with_no_stages_yet_untouched() {
        let job_id = JobId::generate();
        let catalog = Arc::new(FakeCatalog::default());
        catalog.jobs.lock().unwrap().push(make_job(job_id, HashMap::new()));

        let monitor = Monitor::new(catalog.clone(), JobTrackerConfig::default());
        monitor.sweep().await.unwrap();

        assert!(catalog.transitions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn leaves_an_in_flight_job_untouched() {
        let job_id = JobId::generate();
        let mut stages = HashMap::new();
        stages.insert(
            "thumbnail".to_string(),
            StageCounters {
                status: gallerist_model::StageStatus::InProgress,
                total: 10,
                completed: 4,
                failed: 0,
                skipped: 0,
            },
        );
        let catalog = Arc::new(FakeCatalog::default());
        catalog.jobs.lock().unwrap().push(make_job(job_id, stages));

        let monitor = Monitor::new(catalog.clone(), JobTrackerConfig::default());
        monitor.sweep().await.unwrap();

        assert!(catalog.transitions.lock().unwrap().is_empty());
    }
}
