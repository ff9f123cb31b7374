use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use dashmap::DashMap;
use gallerist_config::SchedulerConfig;
use gallerist_model::{
    Envelope, Id, JobType, LibraryScan, ScanType, ScheduledJob, ScheduledJobId, ScheduledJobRun,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bus::MessageBus;
use crate::catalog::CatalogGateway;
use crate::error::Result;

use super::reconcile::{diff, ReconcileAction};

/// What the registry remembers about one scheduled job between reconcile
/// passes: enough to detect a cron change and to know when it next fires.
struct RegisteredJob {
    cron_expression: String,
    schedule: Schedule,
    next_run_at: chrono::DateTime<Utc>,
}

/// Owns the recurring-job registry and drives both the reconciliation loop
/// and per-trigger execution (C10).
pub struct Scheduler {
    catalog: Arc<dyn CatalogGateway>,
    bus: Arc<dyn MessageBus>,
    config: SchedulerConfig,
    registry: DashMap<ScheduledJobId, RegisteredJob>,
}

impl Scheduler {
    pub fn new(catalog: Arc<dyn CatalogGateway>, bus: Arc<dyn MessageBus>, config: SchedulerConfig) -> Self {
        Self {
            catalog,
            bus,
            config,
            registry: DashMap::new(),
        }
    }

    /// Loads every enabled job and registers it, then alternates between
    /// firing due jobs and reconciling against the catalog on
    /// `sync_interval_secs`. Runs forever; intended as its own Tokio task.
    pub async fn run(&self) -> ! {
        if let Err(err) = self.reconcile().await {
            error!(error = %err, "initial scheduler reconciliation failed");
        }

        let mut tick = tokio::time::interval(Duration::from_secs(1));
        let mut ticks_since_reconcile = 0u64;
        loop {
            tick.tick().await;
            if let Err(err) = self.fire_due_jobs().await {
                warn!(error = %err, "scheduler tick failed");
            }

            ticks_since_reconcile += 1;
            if ticks_since_reconcile >= self.config.sync_interval_secs {
                ticks_since_reconcile = 0;
                if let Err(err) = self.reconcile().await {
                    warn!(error = %err, "scheduler reconciliation failed");
                }
            }
        }
    }

    /// One reconciliation pass, exposed separately so tests can drive it
    /// without the `run()` loop.
    pub async fn reconcile(&self) -> Result<()> {
        let enabled = self.catalog.list_enabled_scheduled_jobs().await?;
        let registered: Vec<(ScheduledJobId, String)> = self
            .registry
            .iter()
            .map(|e| (*e.key(), e.value().cron_expression.clone()))
            .collect();

        for action in diff(&enabled, &registered) {
            match action {
                ReconcileAction::Register(id) | ReconcileAction::Reregister(id) => {
                    self.registry.remove(&id);
                    if let Some(job) = enabled.iter().find(|j| j.id == id) {
                        if let Err(err) = self.register(job) {
                            warn!(scheduled_job_id = %id.to_hex(), error = %err, "failed to register scheduled job");
                        }
                    }
                }
                ReconcileAction::Deregister(id) => {
                    self.registry.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn register(&self, job: &ScheduledJob) -> Result<()> {
        let schedule = Schedule::from_str(&job.cron_expression)
            .map_err(|e| crate::error::CoreError::InvalidCron(format!("{}: {e}", job.cron_expression)))?;
        let next_run_at = schedule
            .upcoming(Utc)
            .next()
            .unwrap_or_else(Utc::now);
        self.registry.insert(
            job.id,
            RegisteredJob {
                cron_expression: job.cron_expression.clone(),
                schedule,
                next_run_at,
            },
        );
        info!(scheduled_job_id = %job.id.to_hex(), cron = %job.cron_expression, "registered scheduled job");
        Ok(())
    }

    async fn fire_due_jobs(&self) -> Result<()> {
        let now = Utc::now();
        let due: Vec<ScheduledJobId> = self
            .registry
            .iter()
            .filter(|e| e.value().next_run_at <= now)
            .map(|e| *e.key())
            .collect();

        for id in due {
            if let Some(job) = self.catalog.get_scheduled_job(id).await? {
                if let Err(err) = self.execute(&job).await {
                    warn!(scheduled_job_id = %id.to_hex(), error = %err, "scheduled job execution failed");
                }
            }
            if let Some(mut entry) = self.registry.get_mut(&id) {
                let next = entry
                    .schedule
                    .upcoming(Utc)
                    .next()
                    .unwrap_or_else(|| now + chrono::Duration::seconds(60));
                entry.next_run_at = next;
            }
        }
        Ok(())
    }

    /// Runs one trigger of `job`: creates the run record, resolves and
    /// publishes the work message, and records the outcome on both the run
    /// and the owning `ScheduledJob`.
    async fn execute(&self, job: &ScheduledJob) -> Result<()> {
        let started_at = Utc::now();
        let run = ScheduledJobRun {
            id: Id::generate(),
            scheduled_job_id: job.id,
            status: gallerist_model::RunStatus::Running,
            started_at,
            completed_at: None,
            duration_ms: None,
            result: HashMap::new(),
            error_message: None,
            triggered_by: gallerist_model::TriggeredBy::Scheduler,
        };
        let run = self.catalog.create_scheduled_job_run(&run).await?;

        let outcome = self.publish_for(job).await;

        match &outcome {
            Ok(()) => {
                self.catalog
                    .complete_scheduled_job_run(run.id, gallerist_model::RunStatus::Completed, None)
                    .await?;
            }
            Err(err) => {
                self.catalog
                    .complete_scheduled_job_run(
                        run.id,
                        gallerist_model::RunStatus::Failed,
                        Some(err.to_string()),
                    )
                    .await?;
            }
        }

        let next_run_at = self.registry.get(&job.id).map(|e| e.next_run_at);
        self.catalog
            .update_scheduled_job_after_run(job.id, outcome.is_ok(), next_run_at)
            .await?;

        outcome
    }

    /// Resolves `job`'s target and publishes its work message. Only
    /// `JobType::LibraryScan` scheduled jobs are supported today —
    /// `CacheCleanup`/others are rejected with `Configuration` until a
    /// corresponding envelope exists.
    async fn publish_for(&self, job: &ScheduledJob) -> Result<()> {
        match job.job_type {
            JobType::LibraryScan => {
                let library_id: gallerist_model::LibraryId = job
                    .parameters
                    .get("libraryId")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        crate::error::CoreError::Configuration(
                            "scheduled LibraryScan job missing libraryId parameter".to_string(),
                        )
                    })?
                    .parse()
                    .map_err(|_| {
                        crate::error::CoreError::Configuration("invalid libraryId parameter".to_string())
                    })?;

                let library = self
                    .catalog
                    .get_library(library_id)
                    .await?
                    .filter(|l| !l.is_deleted)
                    .ok_or_else(|| {
                        crate::error::CoreError::NotFound(format!("library {}", library_id.to_hex()))
                    })?;

                let envelope = Envelope::LibraryScan {
                    correlation_id: Uuid::new_v4(),
                    body: LibraryScan {
                        library_id: library.id,
                        library_path: library.root_path,
                        scan_type: ScanType::Full,
                        include_subfolders: true,
                        resume_incomplete: true,
                        overwrite_existing: false,
                        scheduled_job_id: Some(job.id),
                        job_run_id: None,
                    },
                };
                self.bus.publish(&envelope).await.map(|_| ())
            }
            other => Err(crate::error::CoreError::Configuration(format!(
                "scheduled jobs of type {other:?} are not yet supported"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gallerist_model::*;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::bus::Delivery;
    use crate::catalog::{CollectionFilter, LibraryStatsDelta, StageCounterField};

    #[derive(Default)]
    struct FakeCatalog {
        library: Mutex<Option<Library>>,
        scheduled_job: Mutex<Option<ScheduledJob>>,
        runs: Mutex<Vec<ScheduledJobRun>>,
        completed: Mutex<Vec<(ScheduledJobRunId, RunStatus)>>,
        after_run: Mutex<Vec<(ScheduledJobId, bool)>>,
    }

    #[async_trait]
    impl CatalogGateway for FakeCatalog {
        async fn create_library(&self, library: &Library) -> Result<Library> {
            Ok(library.clone())
        }
        async fn get_library(&self, _id: LibraryId) -> Result<Option<Library>> {
            Ok(self.library.lock().unwrap().clone())
        }
        async fn increment_library_stats(&self, _id: LibraryId, _delta: LibraryStatsDelta) -> Result<()> {
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
        async fn find_collection_by_path(&self, _library_id: LibraryId, _path: &str) -> Result<Option<Collection>> {
            Ok(None)
        }
        async fn push_image(&self, _collection_id: CollectionId, _image: ImageEmbedded) -> Result<()> {
            Ok(())
        }
        async fn push_thumbnail(&self, _collection_id: CollectionId, _thumbnail: ThumbnailEmbedded) -> Result<()> {
            Ok(())
        }
        async fn push_cache_image(&self, _collection_id: CollectionId, _cache_image: CacheImageEmbedded) -> Result<()> {
            Ok(())
        }
        async fn clear_derivatives(&self, _collection_id: CollectionId) -> Result<()> {
            Ok(())
        }
        async fn find_collections_paged(&self, _filter: &CollectionFilter, _skip: i64, _limit: i64) -> Result<Vec<Collection>> {
            Ok(vec![])
        }
        async fn count_collections(&self, _filter: &CollectionFilter) -> Result<i64> {
            Ok(0)
        }
        async fn create_job(&self, job: &BackgroundJob) -> Result<BackgroundJob> {
            Ok(job.clone())
        }
        async fn get_job(&self, _id: JobId) -> Result<Option<BackgroundJob>> {
            Ok(None)
        }
        async fn init_stage_total(&self, _job_id: JobId, _stage: &str, _total: i64) -> Result<()> {
            Ok(())
        }
        async fn increment_stage(&self, _job_id: JobId, _stage: &str, _field: StageCounterField, _delta: i64) -> Result<()> {
            Ok(())
        }
        async fn transition_job_status(&self, _job_id: JobId, _status: JobStatus, _message: Option<String>) -> Result<()> {
            Ok(())
        }
        async fn find_active_jobs(&self) -> Result<Vec<BackgroundJob>> {
            Ok(vec![])
        }
        async fn list_enabled_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
            Ok(vec![])
        }
        async fn get_scheduled_job(&self, id: ScheduledJobId) -> Result<Option<ScheduledJob>> {
            Ok(self
                .scheduled_job
                .lock()
                .unwrap()
                .clone()
                .filter(|j| j.id == id))
        }
        async fn update_scheduled_job_after_run(&self, id: ScheduledJobId, success: bool, _next_run_at: Option<chrono::DateTime<Utc>>) -> Result<()> {
            self.after_run.lock().unwrap().push((id, success));
            Ok(())
        }
        async fn create_scheduled_job_run(&self, run: &ScheduledJobRun) -> Result<ScheduledJobRun> {
            self.runs.lock().unwrap().push(run.clone());
            Ok(run.clone())
        }
        async fn complete_scheduled_job_run(&self, run_id: ScheduledJobRunId, status: RunStatus, _error_message: Option<String>) -> Result<()> {
            self.completed.lock().unwrap().push((run_id, status));
            Ok(())
        }
        async fn list_active_cache_folders(&self) -> Result<Vec<CacheFolder>> {
            Ok(vec![])
        }
        async fn record_cache_file(&self, _folder_id: CacheFolderId, _collection_id: CollectionId, _bytes: i64) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeBus {
        published: Mutex<Vec<Envelope>>,
    }

    #[async_trait]
    impl MessageBus for FakeBus {
        async fn publish(&self, envelope: &Envelope) -> Result<String> {
            self.published.lock().unwrap().push(envelope.clone());
            Ok("1-0".to_string())
        }
        async fn consume(&self, _queue: &str, _group: &str, _consumer: &str, _prefetch: u32) -> Result<Vec<Delivery>> {
            Ok(vec![])
        }
        async fn claim_stale(&self, _queue: &str, _group: &str, _consumer: &str, _min_idle_ms: u64, _count: u32) -> Result<Vec<Delivery>> {
            Ok(vec![])
        }
        async fn ack(&self, _queue: &str, _group: &str, _stream_id: &str) -> Result<()> {
            Ok(())
        }
        async fn nack(&self, _queue: &str, _group: &str, _delivery: &Delivery, _max_retries: u32, _retry_base_delay_ms: u64, _reason: &str) -> Result<()> {
            Ok(())
        }
    }

    fn library(id: LibraryId) -> Library {
        Library {
            id,
            name: "A".into(),
            root_path: "/media/a".into(),
            owner_id: "u1".into(),
            settings: LibrarySettings::default(),
            statistics: LibraryStatistics::default(),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scan_job(id: ScheduledJobId, library_id: LibraryId) -> ScheduledJob {
        let mut parameters = HashMap::new();
        parameters.insert("libraryId".to_string(), json!(library_id.to_hex()));
        ScheduledJob {
            id,
            name: "daily".into(),
            job_type: JobType::LibraryScan,
            cron_expression: "0 2 * * *".into(),
            interval_seconds: None,
            is_enabled: true,
            parameters,
            last_run_at: None,
            next_run_at: None,
            run_count: 0,
            success_count: 0,
            failure_count: 0,
            last_status: None,
            last_error: None,
            priority: 0,
            timeout_seconds: 3600,
            max_retries: 0,
        }
    }

    #[tokio::test]
    async fn executes_a_library_scan_job_and_publishes_its_envelope() {
        let library_id = Id::generate();
        let catalog = Arc::new(FakeCatalog::default());
        *catalog.library.lock().unwrap() = Some(library(library_id));
        let bus = Arc::new(FakeBus::default());
        let scheduler = Scheduler::new(catalog.clone(), bus.clone(), SchedulerConfig::default());

        let job = scan_job(Id::generate(), library_id);
        scheduler.execute(&job).await.unwrap();

        assert_eq!(bus.published.lock().unwrap().len(), 1);
        assert_eq!(
            catalog.completed.lock().unwrap().as_slice(),
            &[(catalog.runs.lock().unwrap()[0].id, RunStatus::Completed)]
        );
        assert_eq!(catalog.after_run.lock().unwrap(), vec![(job.id, true)]);
    }

    #[tokio::test]
    async fn fails_the_run_when_the_target_library_is_missing() {
        let catalog = Arc::new(FakeCatalog::default());
        let bus = Arc::new(FakeBus::default());
        let scheduler = Scheduler::new(catalog.clone(), bus.clone(), SchedulerConfig::default());

        let job = scan_job(Id::generate(), Id::generate());
        let result = scheduler.execute(&job).await;

        assert!(result.is_err());
        assert!(bus.published.lock().unwrap().is_empty());
        assert_eq!(
            catalog.completed.lock().unwrap()[0].1,
            RunStatus::Failed
        );
        assert_eq!(catalog.after_run.lock().unwrap(), vec![(job.id, false)]);
    }

    #[tokio::test]
    async fn fire_due_jobs_executes_only_jobs_whose_next_run_has_passed() {
        let library_id = Id::generate();
        let catalog = Arc::new(FakeCatalog::default());
        *catalog.library.lock().unwrap() = Some(library(library_id));
        let bus = Arc::new(FakeBus::default());
        let scheduler = Scheduler::new(catalog.clone(), bus.clone(), SchedulerConfig::default());

        let due_job = scan_job(Id::generate(), library_id);
        let not_due_job = scan_job(Id::generate(), library_id);

        scheduler.registry.insert(
            due_job.id,
            RegisteredJob {
                cron_expression: due_job.cron_expression.clone(),
                schedule: Schedule::from_str(&due_job.cron_expression).unwrap(),
                next_run_at: Utc::now() - chrono::Duration::seconds(5),
            },
        );
        scheduler.registry.insert(
            not_due_job.id,
            RegisteredJob {
                cron_expression: not_due_job.cron_expression.clone(),
                schedule: Schedule::from_str(&not_due_job.cron_expression).unwrap(),
                next_run_at: Utc::now() + chrono::Duration::hours(1),
            },
        );

        *catalog.scheduled_job.lock().unwrap() = Some(due_job.clone());
        scheduler.fire_due_jobs().await.unwrap();

        assert_eq!(bus.published.lock().unwrap().len(), 1);
        assert_eq!(catalog.after_run.lock().unwrap(), vec![(due_job.id, true)]);
        assert!(scheduler
            .registry
            .get(&due_job.id)
            .map(|e| e.next_run_at > Utc::now())
            .unwrap_or(false));
    }
}
