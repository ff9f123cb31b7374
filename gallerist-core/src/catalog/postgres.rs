//! Postgres/JSONB realization of the [`super::CatalogGateway`]. Embedded
//! arrays (`images`, `thumbnails`, `cache_images`, ...) are JSONB columns;
//! every write below is a single `UPDATE`/`INSERT` statement, never an
//! application-level read-modify-write, matching §4.3's "atomic at the
//! document level" contract.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use gallerist_model::{
    BackgroundJob, CacheFolder, CacheImageEmbedded, Collection, CollectionId, CollectionSettings,
    CollectionStatistics, CollectionType, ImageEmbedded, JobId, JobStatus, JobType, Library,
    LibraryId, LibrarySettings, LibraryStatistics, RunStatus, ScheduledJob, ScheduledJobId,
    ScheduledJobRun, ScheduledJobRunId, StageCounters, ThumbnailEmbedded,
};

use crate::error::{CoreError, Result};

use super::{CatalogGateway, CollectionFilter, LibraryStatsDelta, StageCounterField};

/// A Postgres-backed catalog gateway. Cheap to clone: it only wraps a
/// `PgPool`, itself an `Arc`-backed connection pool.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl fmt::Debug for PostgresCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCatalog")
            .field("pool_size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresCatalog {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::Internal(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn stage_field_name(field: StageCounterField) -> &'static str {
    match field {
        StageCounterField::Total => "total",
        StageCounterField::Completed => "completed",
        StageCounterField::Failed => "failed",
        StageCounterField::Skipped => "skipped",
    }
}

fn job_status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Pending",
        JobStatus::InProgress => "InProgress",
        JobStatus::Completed => "Completed",
        JobStatus::Failed => "Failed",
        JobStatus::Cancelled => "Cancelled",
    }
}

fn run_status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "Running",
        RunStatus::Completed => "Completed",
        RunStatus::Failed => "Failed",
    }
}

fn job_type_label(job_type: JobType) -> &'static str {
    match job_type {
        JobType::LibraryScan => "library-scan",
        JobType::CollectionScan => "collection-scan",
        JobType::ResumeCollection => "resume-collection",
        JobType::CacheCleanup => "cache-cleanup",
    }
}

fn parse_job_status(label: &str) -> Result<JobStatus> {
    Ok(match label {
        "Pending" => JobStatus::Pending,
        "InProgress" => JobStatus::InProgress,
        "Completed" => JobStatus::Completed,
        "Failed" => JobStatus::Failed,
        "Cancelled" => JobStatus::Cancelled,
        other => return Err(CoreError::Internal(format!("unknown job status: {other}"))),
    })
}

fn parse_job_type(label: &str) -> Result<JobType> {
    Ok(match label {
        "library-scan" => JobType::LibraryScan,
        "collection-scan" => JobType::CollectionScan,
        "resume-collection" => JobType::ResumeCollection,
        "cache-cleanup" => JobType::CacheCleanup,
        other => return Err(CoreError::Internal(format!("unknown job type: {other}"))),
    })
}

fn parse_collection_type(label: &str) -> Result<CollectionType> {
    Ok(match label {
        "Folder" => CollectionType::Folder,
        "Zip" => CollectionType::Zip,
        "Rar" => CollectionType::Rar,
        "SevenZ" => CollectionType::SevenZ,
        "Cbz" => CollectionType::Cbz,
        "Cbr" => CollectionType::Cbr,
        other => return Err(CoreError::Internal(format!("unknown collection type: {other}"))),
    })
}

fn library_from_row(row: &PgRow) -> Result<Library> {
    let id: String = row.try_get("id")?;
    let settings: Json<LibrarySettings> = row.try_get("settings")?;
    let statistics: Json<LibraryStatistics> = row.try_get("statistics")?;
    Ok(Library {
        id: id.parse().map_err(|_| CoreError::Internal("bad library id".into()))?,
        name: row.try_get("name")?,
        root_path: row.try_get("root_path")?,
        owner_id: row.try_get("owner_id")?,
        settings: settings.0,
        statistics: statistics.0,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collection_from_row(row: &PgRow) -> Result<Collection> {
    let id: String = row.try_get("id")?;
    let library_id: String = row.try_get("library_id")?;
    let type_label: String = row.try_get("type")?;
    let images: Json<Vec<ImageEmbedded>> = row.try_get("images")?;
    let thumbnails: Json<Vec<ThumbnailEmbedded>> = row.try_get("thumbnails")?;
    let cache_images: Json<Vec<CacheImageEmbedded>> = row.try_get("cache_images")?;
    let settings: Json<CollectionSettings> = row.try_get("settings")?;
    let statistics: Json<CollectionStatistics> = row.try_get("statistics")?;
    Ok(Collection {
        id: id.parse().map_err(|_| CoreError::Internal("bad collection id".into()))?,
        library_id: library_id
            .parse()
            .map_err(|_| CoreError::Internal("bad library id".into()))?,
        name: row.try_get("name")?,
        path: row.try_get("path")?,
        kind: parse_collection_type(&type_label)?,
        images: images.0,
        thumbnails: thumbnails.0,
        cache_images: cache_images.0,
        settings: settings.0,
        statistics: statistics.0,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn job_from_row(row: &PgRow) -> Result<BackgroundJob> {
    let id: String = row.try_get("id")?;
    let job_type: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    let collection_id: Option<String> = row.try_get("collection_id")?;
    let library_id: Option<String> = row.try_get("library_id")?;
    let stages: Json<HashMap<String, StageCounters>> = row.try_get("stages")?;
    Ok(BackgroundJob {
        id: id.parse().map_err(|_| CoreError::Internal("bad job id".into()))?,
        job_type: parse_job_type(&job_type)?,
        collection_id: collection_id
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| CoreError::Internal("bad collection id".into()))?,
        library_id: library_id
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| CoreError::Internal("bad library id".into()))?,
        status: parse_job_status(&status)?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        message: row.try_get("message")?,
        stages: stages.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn scheduled_job_from_row(row: &PgRow) -> Result<ScheduledJob> {
    let id: String = row.try_get("id")?;
    let job_type: String = row.try_get("job_type")?;
    let parameters: Json<HashMap<String, serde_json::Value>> = row.try_get("parameters")?;
    let last_status: Option<String> = row.try_get("last_status")?;
    Ok(ScheduledJob {
        id: id
            .parse()
            .map_err(|_| CoreError::Internal("bad scheduled job id".into()))?,
        name: row.try_get("name")?,
        job_type: parse_job_type(&job_type)?,
        cron_expression: row.try_get("cron_expression")?,
        interval_seconds: row.try_get("interval_seconds")?,
        is_enabled: row.try_get("is_enabled")?,
        parameters: parameters.0,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
        run_count: row.try_get("run_count")?,
        success_count: row.try_get("success_count")?,
        failure_count: row.try_get("failure_count")?,
        last_status: last_status
            .map(|s| parse_run_status(&s))
            .transpose()?,
        last_error: row.try_get("last_error")?,
        priority: row.try_get("priority")?,
        timeout_seconds: row.try_get("timeout_seconds")?,
        max_retries: row.try_get("max_retries")?,
    })
}

fn parse_run_status(label: &str) -> Result<RunStatus> {
    Ok(match label {
        "Running" => RunStatus::Running,
        "Completed" => RunStatus::Completed,
        "Failed" => RunStatus::Failed,
        other => return Err(CoreError::Internal(format!("unknown run status: {other}"))),
    })
}

fn cache_folder_from_row(row: &PgRow) -> Result<CacheFolder> {
    let id: String = row.try_get("id")?;
    let cached_ids: Json<Vec<String>> = row.try_get("cached_collection_ids")?;
    let cached_collection_ids = cached_ids
        .0
        .into_iter()
        .map(|s| s.parse::<CollectionId>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| CoreError::Internal("bad cached collection id".into()))?;
    Ok(CacheFolder {
        id: id
            .parse()
            .map_err(|_| CoreError::Internal("bad cache folder id".into()))?,
        path: row.try_get("path")?,
        priority: row.try_get("priority")?,
        is_active: row.try_get("is_active")?,
        current_size_bytes: row.try_get("current_size_bytes")?,
        total_files: row.try_get("total_files")?,
        total_collections: row.try_get("total_collections")?,
        cached_collection_ids,
    })
}

#[async_trait]
impl CatalogGateway for PostgresCatalog {
    async fn create_library(&self, library: &Library) -> Result<Library> {
        let row = sqlx::query(
            r#"
            INSERT INTO libraries (id, name, root_path, owner_id, settings, statistics, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, root_path, owner_id, settings, statistics, is_deleted, created_at, updated_at
            "#,
        )
        .bind(library.id.to_hex())
        .bind(&library.name)
        .bind(&library.root_path)
        .bind(&library.owner_id)
        .bind(Json(library.settings))
        .bind(Json(library.statistics))
        .bind(library.is_deleted)
        .bind(library.created_at)
        .bind(library.updated_at)
        .fetch_one(&self.pool)
        .await?;
        library_from_row(&row)
    }

    async fn get_library(&self, id: LibraryId) -> Result<Option<Library>> {
        let row = sqlx::query(
            "SELECT id, name, root_path, owner_id, settings, statistics, is_deleted, created_at, updated_at \
             FROM libraries WHERE id = $1",
        )
        .bind(id.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(library_from_row).transpose()
    }

    async fn increment_library_stats(
        &self,
        id: LibraryId,
        delta: LibraryStatsDelta,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE libraries
            SET statistics = jsonb_set(
                    jsonb_set(
                        jsonb_set(
                            statistics,
                            '{total_collections}',
                            to_jsonb(COALESCE((statistics->>'total_collections')::bigint, 0) + $2)
                        ),
                        '{total_media_items}',
                        to_jsonb(COALESCE((statistics->>'total_media_items')::bigint, 0) + $3)
                    ),
                    '{total_size_bytes}',
                    to_jsonb(COALESCE((statistics->>'total_size_bytes')::bigint, 0) + $4)
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_hex())
        .bind(delta.collections)
        .bind(delta.media_items)
        .bind(delta.size_bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_library_scanned(&self, id: LibraryId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE libraries
            SET statistics = jsonb_set(
                    jsonb_set(statistics, '{scan_count}', to_jsonb(COALESCE((statistics->>'scan_count')::bigint, 0) + 1)),
                    '{last_scan_at}', to_jsonb(NOW())
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_hex())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_collection(&self, collection: &Collection) -> Result<Collection> {
        let type_label = match collection.kind {
            CollectionType::Folder => "Folder",
            CollectionType::Zip => "Zip",
            CollectionType::Rar => "Rar",
            CollectionType::SevenZ => "SevenZ",
            CollectionType::Cbz => "Cbz",
            CollectionType::Cbr => "Cbr",
        };
        let row = sqlx::query(
            r#"
            INSERT INTO collections
                (id, library_id, name, path, type, images, thumbnails, cache_images, settings, statistics, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, library_id, name, path, type, images, thumbnails, cache_images, settings, statistics, is_deleted, created_at, updated_at
            "#,
        )
        .bind(collection.id.to_hex())
        .bind(collection.library_id.to_hex())
        .bind(&collection.name)
        .bind(&collection.path)
        .bind(type_label)
        .bind(Json(&collection.images))
        .bind(Json(&collection.thumbnails))
        .bind(Json(&collection.cache_images))
        .bind(Json(collection.settings))
        .bind(Json(collection.statistics))
        .bind(collection.is_deleted)
        .bind(collection.created_at)
        .bind(collection.updated_at)
        .fetch_one(&self.pool)
        .await?;
        collection_from_row(&row)
    }

    async fn get_collection(&self, id: CollectionId) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, library_id, name, path, type, images, thumbnails, cache_images, settings, statistics, is_deleted, created_at, updated_at \
             FROM collections WHERE id = $1",
        )
        .bind(id.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(collection_from_row).transpose()
    }

    async fn find_collection_by_path(
        &self,
        library_id: LibraryId,
        path: &str,
    ) -> Result<Option<Collection>> {
        let row = sqlx::query(
            "SELECT id, library_id, name, path, type, images, thumbnails, cache_images, settings, statistics, is_deleted, created_at, updated_at \
             FROM collections WHERE library_id = $1 AND path = $2",
        )
        .bind(library_id.to_hex())
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(collection_from_row).transpose()
    }

    async fn push_image(&self, collection_id: CollectionId, image: ImageEmbedded) -> Result<()> {
        sqlx::query(
            "UPDATE collections SET images = images || $2::jsonb, updated_at = NOW() WHERE id = $1",
        )
        .bind(collection_id.to_hex())
        .bind(serde_json::to_value(&[image])?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn push_thumbnail(
        &self,
        collection_id: CollectionId,
        thumbnail: ThumbnailEmbedded,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE collections SET thumbnails = thumbnails || $2::jsonb, updated_at = NOW() WHERE id = $1",
        )
        .bind(collection_id.to_hex())
        .bind(serde_json::to_value(&[thumbnail])?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn push_cache_image(
        &self,
        collection_id: CollectionId,
        cache_image: CacheImageEmbedded,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE collections SET cache_images = cache_images || $2::jsonb, updated_at = NOW() WHERE id = $1",
        )
        .bind(collection_id.to_hex())
        .bind(serde_json::to_value(&[cache_image])?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_derivatives(&self, collection_id: CollectionId) -> Result<()> {
        sqlx::query(
            "UPDATE collections SET thumbnails = '[]'::jsonb, cache_images = '[]'::jsonb, updated_at = NOW() WHERE id = $1",
        )
        .bind(collection_id.to_hex())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_collections_paged(
        &self,
        filter: &CollectionFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Collection>> {
        let rows = sqlx::query(
            r#"
            SELECT id, library_id, name, path, type, images, thumbnails, cache_images, settings, statistics, is_deleted, created_at, updated_at
            FROM collections
            WHERE ($1::text IS NULL OR library_id = $1)
              AND (is_deleted = false OR $2 = true)
            ORDER BY updated_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(filter.library_id.map(|id| id.to_hex()))
        .bind(filter.include_deleted)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(collection_from_row).collect()
    }

    async fn count_collections(&self, filter: &CollectionFilter) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM collections WHERE ($1::text IS NULL OR library_id = $1) AND (is_deleted = false OR $2 = true)",
        )
        .bind(filter.library_id.map(|id| id.to_hex()))
        .bind(filter.include_deleted)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("total")?)
    }

    async fn create_job(&self, job: &BackgroundJob) -> Result<BackgroundJob> {
        let row = sqlx::query(
            r#"
            INSERT INTO background_jobs
                (id, type, collection_id, library_id, status, started_at, completed_at, message, stages, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, type, collection_id, library_id, status, started_at, completed_at, message, stages, created_at, updated_at
            "#,
        )
        .bind(job.id.to_hex())
        .bind(job_type_label(job.job_type))
        .bind(job.collection_id.map(|id| id.to_hex()))
        .bind(job.library_id.map(|id| id.to_hex()))
        .bind(job_status_label(job.status))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.message)
        .bind(Json(&job.stages))
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await?;
        job_from_row(&row)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<BackgroundJob>> {
        let row = sqlx::query(
            "SELECT id, type, collection_id, library_id, status, started_at, completed_at, message, stages, created_at, updated_at \
             FROM background_jobs WHERE id = $1",
        )
        .bind(id.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn init_stage_total(&self, job_id: JobId, stage: &str, total: i64) -> Result<()> {
        let initial = StageCounters {
            total,
            ..StageCounters::default()
        };
        sqlx::query(
            "UPDATE background_jobs SET stages = jsonb_set(stages, ARRAY[$2]::text[], $3::jsonb, true), updated_at = NOW() WHERE id = $1",
        )
        .bind(job_id.to_hex())
        .bind(stage)
        .bind(serde_json::to_value(initial)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_stage(
        &self,
        job_id: JobId,
        stage: &str,
        field: StageCounterField,
        delta: i64,
    ) -> Result<()> {
        let field_name = stage_field_name(field);
        sqlx::query(
            r#"
            UPDATE background_jobs
            SET stages = jsonb_set(
                    stages,
                    ARRAY[$2, $3]::text[],
                    to_jsonb(COALESCE((stages #>> ARRAY[$2, $3]::text[])::bigint, 0) + $4),
                    true
                ),
                status = CASE WHEN status = 'Pending' THEN 'InProgress' ELSE status END,
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id.to_hex())
        .bind(stage)
        .bind(field_name)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transition_job_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        message: Option<String>,
    ) -> Result<()> {
        let is_terminal = status.is_terminal();
        sqlx::query(
            r#"
            UPDATE background_jobs
            SET status = $2,
                message = COALESCE($3, message),
                completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id.to_hex())
        .bind(job_status_label(status))
        .bind(message)
        .bind(is_terminal)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active_jobs(&self) -> Result<Vec<BackgroundJob>> {
        let rows = sqlx::query(
            "SELECT id, type, collection_id, library_id, status, started_at, completed_at, message, stages, created_at, updated_at \
             FROM background_jobs WHERE status IN ('Pending', 'InProgress')",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    async fn list_enabled_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, job_type, cron_expression, interval_seconds, is_enabled, parameters,
                   last_run_at, next_run_at, run_count, success_count, failure_count,
                   last_status, last_error, priority, timeout_seconds, max_retries
            FROM scheduled_jobs WHERE is_enabled = true
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(scheduled_job_from_row).collect()
    }

    async fn get_scheduled_job(&self, id: ScheduledJobId) -> Result<Option<ScheduledJob>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, job_type, cron_expression, interval_seconds, is_enabled, parameters,
                   last_run_at, next_run_at, run_count, success_count, failure_count,
                   last_status, last_error, priority, timeout_seconds, max_retries
            FROM scheduled_jobs WHERE id = $1
            "#,
        )
        .bind(id.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(scheduled_job_from_row).transpose()
    }

    async fn update_scheduled_job_after_run(
        &self,
        id: ScheduledJobId,
        success: bool,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_jobs
            SET run_count = run_count + 1,
                success_count = success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                failure_count = failure_count + CASE WHEN $2 THEN 0 ELSE 1 END,
                last_status = CASE WHEN $2 THEN 'Completed' ELSE 'Failed' END,
                last_run_at = NOW(),
                next_run_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.to_hex())
        .bind(success)
        .bind(next_run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_scheduled_job_run(&self, run: &ScheduledJobRun) -> Result<ScheduledJobRun> {
        let triggered_by = match run.triggered_by {
            gallerist_model::TriggeredBy::Scheduler => "Scheduler",
            gallerist_model::TriggeredBy::Manual => "Manual",
            gallerist_model::TriggeredBy::Api => "Api",
        };
        sqlx::query(
            r#"
            INSERT INTO scheduled_job_runs
                (id, scheduled_job_id, status, started_at, completed_at, duration_ms, result, error_message, triggered_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(run.id.to_hex())
        .bind(run.scheduled_job_id.to_hex())
        .bind(run_status_label(run.status))
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.duration_ms)
        .bind(Json(&run.result))
        .bind(&run.error_message)
        .bind(triggered_by)
        .execute(&self.pool)
        .await?;
        Ok(run.clone())
    }

    async fn complete_scheduled_job_run(
        &self,
        run_id: ScheduledJobRunId,
        status: RunStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_job_runs
            SET status = $2, completed_at = NOW(),
                duration_ms = EXTRACT(EPOCH FROM (NOW() - started_at)) * 1000,
                error_message = $3
            WHERE id = $1
            "#,
        )
        .bind(run_id.to_hex())
        .bind(run_status_label(status))
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_active_cache_folders(&self) -> Result<Vec<CacheFolder>> {
        let rows = sqlx::query(
            "SELECT id, path, priority, is_active, current_size_bytes, total_files, total_collections, cached_collection_ids \
             FROM cache_folders WHERE is_active = true ORDER BY priority ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(cache_folder_from_row).collect()
    }

    async fn record_cache_file(
        &self,
        folder_id: gallerist_model::CacheFolderId,
        collection_id: CollectionId,
        bytes: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE cache_folders
            SET current_size_bytes = current_size_bytes + $3,
                total_files = total_files + 1,
                cached_collection_ids = CASE
                    WHEN cached_collection_ids @> to_jsonb(ARRAY[$2]::text[])
                    THEN cached_collection_ids
                    ELSE cached_collection_ids || to_jsonb(ARRAY[$2]::text[])
                END,
                total_collections = jsonb_array_length(
                    CASE
                        WHEN cached_collection_ids @> to_jsonb(ARRAY[$2]::text[])
                        THEN cached_collection_ids
                        ELSE cached_collection_ids || to_jsonb(ARRAY[$2]::text[])
                    END
                )
            WHERE id = $1
            "#,
        )
        .bind(folder_id.to_hex())
        .bind(collection_id.to_hex())
        .bind(bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

