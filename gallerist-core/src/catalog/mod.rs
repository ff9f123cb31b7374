//! Catalog Gateway: the abstraction over the document store. Every write is
//! a single atomic statement against one row — no read-modify-write, no
//! cross-row transactions. Realized over Postgres/JSONB (`postgres`
//! module); the trait is the seam a test double can stand in for.

pub mod postgres;

use async_trait::async_trait;
use gallerist_model::{
    BackgroundJob, CacheFolder, CacheImageEmbedded, Collection, ImageEmbedded, JobId, JobStatus,
    Library, LibraryId, ScheduledJob, ScheduledJobId, ScheduledJobRun, ScheduledJobRunId,
    ThumbnailEmbedded,
};

use crate::error::Result;

pub use self::postgres::PostgresCatalog;

/// Non-count delta applied to [`gallerist_model::LibraryStatistics`] by
/// `increment_library_stats` — mirrors C11's `incrementLibraryStats`
/// contract (`{+collections?, +items?, +bytes?}`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryStatsDelta {
    pub collections: i64,
    pub media_items: i64,
    pub size_bytes: i64,
}

/// A stage counter field that may be atomically incremented. `Total` is set
/// once up front (never incremented after), the others only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCounterField {
    Total,
    Completed,
    Failed,
    Skipped,
}

/// Sort/paging parameters for `find_collections_paged`, the Rust analogue of
/// the spec's generic `findPaged(filter, sort, skip, limit)`.
#[derive(Debug, Clone)]
pub struct CollectionFilter {
    pub library_id: Option<LibraryId>,
    pub include_deleted: bool,
}

impl Default for CollectionFilter {
    fn default() -> Self {
        Self {
            library_id: None,
            include_deleted: false,
        }
    }
}

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    // Libraries
    async fn create_library(&self, library: &Library) -> Result<Library>;
    async fn get_library(&self, id: LibraryId) -> Result<Option<Library>>;
    async fn increment_library_stats(&self, id: LibraryId, delta: LibraryStatsDelta)
    -> Result<()>;
    async fn mark_library_scanned(&self, id: LibraryId) -> Result<()>;

    // Collections
    async fn create_collection(&self, collection: &Collection) -> Result<Collection>;
    async fn get_collection(&self, id: gallerist_model::CollectionId)
    -> Result<Option<Collection>>;
    async fn find_collection_by_path(
        &self,
        library_id: LibraryId,
        path: &str,
    ) -> Result<Option<Collection>>;
    async fn push_image(
        &self,
        collection_id: gallerist_model::CollectionId,
        image: ImageEmbedded,
    ) -> Result<()>;
    async fn push_thumbnail(
        &self,
        collection_id: gallerist_model::CollectionId,
        thumbnail: ThumbnailEmbedded,
    ) -> Result<()>;
    async fn push_cache_image(
        &self,
        collection_id: gallerist_model::CollectionId,
        cache_image: CacheImageEmbedded,
    ) -> Result<()>;
    async fn clear_derivatives(&self, collection_id: gallerist_model::CollectionId) -> Result<()>;
    async fn find_collections_paged(
        &self,
        filter: &CollectionFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Collection>>;
    async fn count_collections(&self, filter: &CollectionFilter) -> Result<i64>;

    // Jobs
    async fn create_job(&self, job: &BackgroundJob) -> Result<BackgroundJob>;
    async fn get_job(&self, id: JobId) -> Result<Option<BackgroundJob>>;
    async fn init_stage_total(&self, job_id: JobId, stage: &str, total: i64) -> Result<()>;
    async fn increment_stage(
        &self,
        job_id: JobId,
        stage: &str,
        field: StageCounterField,
        delta: i64,
    ) -> Result<()>;
    async fn transition_job_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<()>;
    async fn find_active_jobs(&self) -> Result<Vec<BackgroundJob>>;

    // Scheduled jobs
    async fn list_enabled_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>>;
    async fn get_scheduled_job(&self, id: ScheduledJobId) -> Result<Option<ScheduledJob>>;
    async fn update_scheduled_job_after_run(
        &self,
        id: ScheduledJobId,
        success: bool,
        next_run_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()>;
    async fn create_scheduled_job_run(&self, run: &ScheduledJobRun) -> Result<ScheduledJobRun>;
    async fn complete_scheduled_job_run(
        &self,
        run_id: ScheduledJobRunId,
        status: gallerist_model::RunStatus,
        error_message: Option<String>,
    ) -> Result<()>;

    // Cache folders
    async fn list_active_cache_folders(&self) -> Result<Vec<CacheFolder>>;
    async fn record_cache_file(
        &self,
        folder_id: gallerist_model::CacheFolderId,
        collection_id: gallerist_model::CollectionId,
        bytes: i64,
    ) -> Result<()>;
}
