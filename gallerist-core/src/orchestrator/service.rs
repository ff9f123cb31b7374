use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use gallerist_model::{
    BackgroundJob, CacheGen, Collection, CollectionSettings, CollectionStatistics, CollectionType,
    Envelope, Id, JobStatus, JobType, Library, LibraryScan, ThumbnailGen,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::{self, ArchiveKind};
use crate::bus::MessageBus;
use crate::catalog::CatalogGateway;
use crate::error::{CoreError, Result};
use crate::jobs::JobTracker;

use super::classify::{classify, Action, ClassificationInput};

/// Consumes [`LibraryScan`] messages: the entry point for a library scan
/// (C6). Classifies every candidate directory/archive and either creates
/// fresh work, clears and re-queues it, or resumes only the missing
/// derivatives.
pub struct ScanOrchestrator {
    catalog: Arc<dyn CatalogGateway>,
    bus: Arc<dyn MessageBus>,
    jobs: JobTracker,
}

fn collection_type_for(kind: Option<ArchiveKind>) -> CollectionType {
    match kind {
        None => CollectionType::Folder,
        Some(ArchiveKind::Zip) => CollectionType::Zip,
        Some(ArchiveKind::Rar) => CollectionType::Rar,
        Some(ArchiveKind::SevenZ) => CollectionType::SevenZ,
        Some(ArchiveKind::Cbz) => CollectionType::Cbz,
        Some(ArchiveKind::Cbr) => CollectionType::Cbr,
    }
}

impl ScanOrchestrator {
    pub fn new(catalog: Arc<dyn CatalogGateway>, bus: Arc<dyn MessageBus>) -> Self {
        let jobs = JobTracker::new(catalog.clone());
        Self { catalog, bus, jobs }
    }

    /// Walks `root`, returning every directory/archive candidate that
    /// `hasSupportedImage` accepts, paired with the collection type it would
    /// be cataloged as.
    fn discover_candidates(
        &self,
        root: &Path,
        include_subfolders: bool,
    ) -> Result<Vec<(PathBuf, CollectionType)>> {
        let mut candidates = Vec::new();
        let folders = archive::enumerate_folders(root, include_subfolders)?;

        for folder in &folders {
            if archive::has_supported_image(folder)? {
                candidates.push((folder.clone(), CollectionType::Folder));
            }

            for entry in std::fs::read_dir(folder)? {
                let entry = entry?;
                let path = entry.path();
                if let Some(kind) = archive::is_archive(&path) {
                    if archive::has_supported_image(&path)? {
                        candidates.push((path, collection_type_for(Some(kind))));
                    }
                }
            }
        }

        Ok(candidates)
    }

    pub async fn handle_library_scan(&self, msg: LibraryScan) -> Result<()> {
        let library = self
            .catalog
            .get_library(msg.library_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("library {}", msg.library_id.to_hex())))?;

        let root = PathBuf::from(&msg.library_path);
        let candidates = self.discover_candidates(&root, msg.include_subfolders)?;
        info!(
            library_id = %msg.library_id.to_hex(),
            candidates = candidates.len(),
            "library scan discovered candidates"
        );

        for (path, kind) in candidates {
            let relative = path
                .strip_prefix(&root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();

            if let Err(err) = self
                .classify_and_act(&library, &relative, kind, msg.overwrite_existing, msg.resume_incomplete)
                .await
            {
                warn!(path = %relative, error = %err, "failed to classify scan candidate");
            }
        }

        self.catalog.mark_library_scanned(msg.library_id).await?;
        Ok(())
    }

    async fn classify_and_act(
        &self,
        library: &Library,
        relative_path: &str,
        kind: CollectionType,
        overwrite_existing: bool,
        resume_incomplete: bool,
    ) -> Result<()> {
        let existing = self
            .catalog
            .find_collection_by_path(library.id, relative_path)
            .await?;

        let action = classify(ClassificationInput {
            collection_exists: existing.is_some(),
            overwrite_existing,
            resume_incomplete,
            has_images: existing.as_ref().is_some_and(|c| !c.images.is_empty()),
        });

        match action {
            Action::Create => {
                let collection = self.create_collection(library, relative_path, kind).await?;
                self.queue_collection_scan(&collection, false).await?;
            }
            Action::ClearAndRescan => {
                let collection = existing.expect("ClearAndRescan implies an existing collection");
                self.catalog.clear_derivatives(collection.id).await?;
                self.queue_collection_scan(&collection, true).await?;
            }
            Action::Resume => {
                let collection = existing.expect("Resume implies an existing collection");
                self.resume_collection(&collection).await?;
            }
            Action::QueueRescan => {
                let collection = match existing {
                    Some(c) => c,
                    None => self.create_collection(library, relative_path, kind).await?,
                };
                self.queue_collection_scan(&collection, false).await?;
            }
            Action::Skip => {}
        }

        Ok(())
    }

    async fn create_collection(
        &self,
        library: &Library,
        relative_path: &str,
        kind: CollectionType,
    ) -> Result<Collection> {
        let now = Utc::now();
        let name = Path::new(relative_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_path.to_string());

        let collection = Collection {
            id: Id::generate(),
            library_id: library.id,
            name,
            path: relative_path.to_string(),
            kind,
            images: Vec::new(),
            thumbnails: Vec::new(),
            cache_images: Vec::new(),
            settings: CollectionSettings {
                thumb_w: library.settings.default_thumb_w,
                thumb_h: library.settings.default_thumb_h,
                cache_w: library.settings.default_cache_w,
                cache_h: library.settings.default_cache_h,
            },
            statistics: CollectionStatistics::default(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let collection = self.catalog.create_collection(&collection).await?;
        self.catalog
            .increment_library_stats(library.id, crate::catalog::LibraryStatsDelta { collections: 1, ..Default::default() })
            .await?;
        Ok(collection)
    }

    async fn queue_collection_scan(&self, collection: &Collection, force_rescan: bool) -> Result<()> {
        let job = BackgroundJob {
            id: Id::generate(),
            job_type: JobType::CollectionScan,
            collection_id: Some(collection.id),
            library_id: Some(collection.library_id),
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            message: None,
            stages: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let job = self.jobs.create(&job).await?;

        let envelope = Envelope::CollectionScan {
            correlation_id: Uuid::new_v4(),
            body: gallerist_model::CollectionScan {
                collection_id: collection.id,
                collection_path: archive::fix_legacy_entry_path(&collection.path),
                force_rescan,
                thumbnail_w: collection.settings.thumb_w,
                thumbnail_h: collection.settings.thumb_h,
                cache_w: collection.settings.cache_w,
                cache_h: collection.settings.cache_h,
                job_id: job.id,
            },
        };
        self.bus.publish(&envelope).await?;
        Ok(())
    }

    /// Resume path (§4.6): initialize stage totals *before* publishing a
    /// message for each missing derivative, so the monitor never observes a
    /// total that is still growing.
    async fn resume_collection(&self, collection: &Collection) -> Result<()> {
        let missing_thumbs = collection.missing_thumbnails();
        let missing_cache = collection.missing_cache_images();

        let job = BackgroundJob {
            id: Id::generate(),
            job_type: JobType::ResumeCollection,
            collection_id: Some(collection.id),
            library_id: Some(collection.library_id),
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            message: None,
            stages: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let job = self.jobs.create(&job).await?;

        self.jobs
            .init_stage_total(job.id, "thumbnail", missing_thumbs.len() as i64)
            .await?;
        self.jobs
            .init_stage_total(job.id, "cache", missing_cache.len() as i64)
            .await?;

        for image in &missing_thumbs {
            let envelope = Envelope::ThumbnailGen {
                correlation_id: Uuid::new_v4(),
                body: ThumbnailGen {
                    image_id: image.id,
                    collection_id: collection.id,
                    image_path: archive::fix_legacy_entry_path(&image.relative_path),
                    filename: image.filename.clone(),
                    width: collection.settings.thumb_w,
                    height: collection.settings.thumb_h,
                    job_id: job.id,
                },
            };
            self.bus.publish(&envelope).await?;
        }

        for image in &missing_cache {
            let envelope = Envelope::CacheGen {
                correlation_id: Uuid::new_v4(),
                body: CacheGen {
                    image_id: image.id,
                    collection_id: collection.id,
                    image_path: archive::fix_legacy_entry_path(&image.relative_path),
                    cache_path: None,
                    width: collection.settings.cache_w,
                    height: collection.settings.cache_h,
                    quality: 85,
                    format: "webp".to_string(),
                    force_regenerate: false,
                    job_id: job.id,
                },
            };
            self.bus.publish(&envelope).await?;
        }

        Ok(())
    }
}
