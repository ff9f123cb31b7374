use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use gallerist_config::ArchiveConfig;
use gallerist_model::{CacheGen, Collection, Envelope, Id, ImageEmbedded, ThumbnailGen};
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::{self};
use crate::bus::MessageBus;
use crate::catalog::{CatalogGateway, LibraryStatsDelta, StageCounterField};
use crate::error::{CoreError, Result};

use super::codec::ImageCodec;

struct DiscoveredImage {
    relative_path: String,
    filename: String,
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

/// Collection-Scan Consumer (C7): enumerates one collection's images,
/// persists new ones, and fans out one `ThumbnailGen`/`CacheGen` pair per
/// new image.
pub struct CollectionScanConsumer {
    catalog: Arc<dyn CatalogGateway>,
    bus: Arc<dyn MessageBus>,
    codec: Arc<dyn ImageCodec>,
    archive: ArchiveConfig,
}

impl CollectionScanConsumer {
    pub fn new(
        catalog: Arc<dyn CatalogGateway>,
        bus: Arc<dyn MessageBus>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        Self::with_archive_config(catalog, bus, codec, ArchiveConfig::default())
    }

    pub fn with_archive_config(
        catalog: Arc<dyn CatalogGateway>,
        bus: Arc<dyn MessageBus>,
        codec: Arc<dyn ImageCodec>,
        archive: ArchiveConfig,
    ) -> Self {
        Self { catalog, bus, codec, archive }
    }

    pub async fn handle(&self, msg: gallerist_model::CollectionScan) -> Result<()> {
        let mut collection = self
            .catalog
            .get_collection(msg.collection_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("collection {}", msg.collection_id.to_hex())))?;
        let library = self
            .catalog
            .get_library(collection.library_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("library {}", collection.library_id.to_hex())))?;
        let root = PathBuf::from(&library.root_path);

        if msg.force_rescan {
            self.catalog.clear_derivatives(collection.id).await?;
            collection.thumbnails.clear();
            collection.cache_images.clear();
        }

        let discovered = self.discover_images(&root, &collection)?;
        let mut new_bytes = 0i64;
        let mut new_count = 0i64;

        for image in discovered {
            // Idempotency guard: a redelivered CollectionScan must not
            // re-persist (or re-queue derivatives for) an image it already
            // recorded.
            if collection.images.iter().any(|i| i.relative_path == image.relative_path) {
                continue;
            }

            let format = Path::new(&image.filename)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_ascii_lowercase();

            let embedded = ImageEmbedded {
                id: Id::generate(),
                filename: image.filename,
                relative_path: image.relative_path,
                size_bytes: image.bytes.len() as i64,
                width: image.width,
                height: image.height,
                format,
                added_at: Utc::now(),
                is_deleted: false,
            };

            self.catalog.push_image(collection.id, embedded.clone()).await?;
            new_bytes += embedded.size_bytes;
            new_count += 1;

            self.catalog
                .increment_stage(msg.job_id, "thumbnail", StageCounterField::Total, 1)
                .await?;
            self.catalog
                .increment_stage(msg.job_id, "cache", StageCounterField::Total, 1)
                .await?;

            let thumbnail_env = Envelope::ThumbnailGen {
                correlation_id: Uuid::new_v4(),
                body: ThumbnailGen {
                    image_id: embedded.id,
                    collection_id: collection.id,
                    image_path: embedded.relative_path.clone(),
                    filename: embedded.filename.clone(),
                    width: msg.thumbnail_w,
                    height: msg.thumbnail_h,
                    job_id: msg.job_id,
                },
            };
            self.bus.publish(&thumbnail_env).await?;

            let cache_env = Envelope::CacheGen {
                correlation_id: Uuid::new_v4(),
                body: CacheGen {
                    image_id: embedded.id,
                    collection_id: collection.id,
                    image_path: embedded.relative_path.clone(),
                    cache_path: None,
                    width: msg.cache_w,
                    height: msg.cache_h,
                    quality: 85,
                    format: "webp".to_string(),
                    force_regenerate: msg.force_rescan,
                    job_id: msg.job_id,
                },
            };
            self.bus.publish(&cache_env).await?;
        }

        if new_count > 0 {
            self.catalog
                .increment_library_stats(
                    library.id,
                    LibraryStatsDelta {
                        media_items: new_count,
                        size_bytes: new_bytes,
                        ..Default::default()
                    },
                )
                .await?;
        }

        info!(
            collection_id = %collection.id.to_hex(),
            new_images = new_count,
            "collection scan complete"
        );
        Ok(())
    }

    fn discover_images(&self, root: &Path, collection: &Collection) -> Result<Vec<DiscoveredImage>> {
        if collection.kind.is_archive() {
            return self.discover_archive_images(root, collection);
        }
        self.discover_folder_images(root, collection)
    }

    fn discover_folder_images(
        &self,
        root: &Path,
        collection: &Collection,
    ) -> Result<Vec<DiscoveredImage>> {
        let dir = root.join(&collection.path);
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !archive::is_supported_image_extension(ext) {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            let bytes = std::fs::read(&path)?;
            let (width, height) = image_dimensions_or_skip(&self.codec, &bytes)?;
            let relative_path = format!("{}/{}", collection.path, filename);
            out.push(DiscoveredImage { relative_path, filename, bytes, width, height });
        }
        Ok(out)
    }

    fn discover_archive_images(
        &self,
        root: &Path,
        collection: &Collection,
    ) -> Result<Vec<DiscoveredImage>> {
        let archive_path = root.join(&collection.path);
        let kind = archive::is_archive(&archive_path).ok_or_else(|| {
            CoreError::InvalidArchive(format!("not a recognized archive: {}", collection.path))
        })?;
        let reader = archive::open_reader(&archive_path, kind)?;
        let entries = reader.list_entries()?;

        if let Some(max_entries) = self.archive.max_entries {
            if entries.len() as u64 > max_entries {
                return Err(CoreError::InvalidArchive(format!(
                    "{} has {} entries, exceeding the configured limit of {max_entries}",
                    collection.path,
                    entries.len()
                )));
            }
        }
        if let Some(max_uncompressed_bytes) = self.archive.max_uncompressed_bytes {
            let total_size: u64 = entries.iter().map(|e| e.size).sum();
            if total_size > max_uncompressed_bytes {
                return Err(CoreError::InvalidArchive(format!(
                    "{} is {total_size} uncompressed bytes, exceeding the configured limit of {max_uncompressed_bytes}",
                    collection.path
                )));
            }
        }

        let mut out = Vec::new();
        for entry in entries {
            if entry.is_directory {
                continue;
            }
            if archive::is_macosx_metadata(&entry.entry_path) {
                continue;
            }
            let Some(ext) = Path::new(&entry.entry_path).extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !archive::is_supported_image_extension(ext) {
                continue;
            }
            let bytes = match reader.read_entry(&entry.entry_path) {
                Ok(b) => b,
                Err(err) => {
                    warn!(entry = %entry.entry_path, error = %err, "skipping unreadable archive entry");
                    continue;
                }
            };
            let (width, height) = image_dimensions_or_skip(&self.codec, &bytes)?;
            let filename = Path::new(&entry.entry_path)
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| entry.entry_path.clone());
            let relative_path = archive::normalize_entry_ref(&collection.path, &entry.entry_path);
            out.push(DiscoveredImage { relative_path, filename, bytes, width, height });
        }
        Ok(out)
    }
}

fn image_dimensions_or_skip(codec: &Arc<dyn ImageCodec>, bytes: &[u8]) -> Result<(u32, u32)> {
    use image::GenericImageView;
    let decoded = codec.decode(bytes)?;
    Ok(decoded.dimensions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gallerist_model::*;
    use image::{Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    use crate::bus::Delivery;
    use crate::catalog::{CatalogGateway, CollectionFilter, LibraryStatsDelta};

    #[derive(Default)]
    struct FakeCatalog {
        library: Mutex<Option<Library>>,
        collection: Mutex<Option<Collection>>,
        pushed_images: Mutex<Vec<ImageEmbedded>>,
        stats_delta: Mutex<Option<LibraryStatsDelta>>,
        stage_counts: Mutex<HashMap<(JobId, String, &'static str), i64>>,
    }

    #[async_trait]
    impl CatalogGateway for FakeCatalog {
        async fn create_library(&self, library: &Library) -> Result<Library> {
            Ok(library.clone())
        }
        async fn get_library(&self, _id: LibraryId) -> Result<Option<Library>> {
            Ok(self.library.lock().unwrap().clone())
        }
        async fn increment_library_stats(&self, _id: LibraryId, delta: LibraryStatsDelta) -> Result<()> {
            *self.stats_delta.lock().unwrap() = Some(delta);
            Ok(())
        }
        async fn mark_library_scanned(&self, _id: LibraryId) -> Result<()> {
            Ok(())
        }
        async fn create_collection(&self, collection: &Collection) -> Result<Collection> {
            Ok(collection.clone())
        }
        async fn get_collection(&self, _id: CollectionId) -> Result<Option<Collection>> {
            Ok(self.collection.lock().unwrap().clone())
        }
        async fn find_collection_by_path(&self, _library_id: LibraryId, _path: &str) -> Result<Option<Collection>> {
            Ok(None)
        }
        async fn push_image(&self, _collection_id: CollectionId, image: ImageEmbedded) -> Result<()> {
            let mut collection = self.collection.lock().unwrap();
            if let Some(c) = collection.as_mut() {
                c.images.push(image.clone());
            }
            self.pushed_images.lock().unwrap().push(image);
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
        async fn increment_stage(
            &self,
            job_id: JobId,
            stage: &str,
            field: crate::catalog::StageCounterField,
            delta: i64,
        ) -> Result<()> {
            let key = match field {
                crate::catalog::StageCounterField::Total => "total",
                crate::catalog::StageCounterField::Completed => "completed",
                crate::catalog::StageCounterField::Failed => "failed",
                crate::catalog::StageCounterField::Skipped => "skipped",
            };
            *self
                .stage_counts
                .lock()
                .unwrap()
                .entry((job_id, stage.to_string(), key))
                .or_insert(0) += delta;
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
        async fn get_scheduled_job(&self, _id: ScheduledJobId) -> Result<Option<ScheduledJob>> {
            Ok(None)
        }
        async fn update_scheduled_job_after_run(&self, _id: ScheduledJobId, _success: bool, _next_run_at: Option<chrono::DateTime<chrono::Utc>>) -> Result<()> {
            Ok(())
        }
        async fn create_scheduled_job_run(&self, run: &ScheduledJobRun) -> Result<ScheduledJobRun> {
            Ok(run.clone())
        }
        async fn complete_scheduled_job_run(&self, _run_id: ScheduledJobRunId, _status: RunStatus, _error_message: Option<String>) -> Result<()> {
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

    fn solid_png(w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([1, 2, 3, 255])));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn library(id: LibraryId, root_path: &std::path::Path) -> Library {
        Library {
            id,
            name: "A".into(),
            root_path: root_path.to_string_lossy().to_string(),
            owner_id: "owner".into(),
            settings: LibrarySettings {
                auto_scan: false,
                default_thumb_w: 100,
                default_thumb_h: 100,
                default_cache_w: 1,
                default_cache_h: 1,
                enable_cache: true,
            },
            statistics: LibraryStatistics::default(),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn collection(id: CollectionId, library_id: LibraryId, images: Vec<ImageEmbedded>) -> Collection {
        Collection {
            id,
            library_id,
            name: "A".into(),
            path: "A".into(),
            kind: CollectionType::Folder,
            images,
            thumbnails: vec![],
            cache_images: vec![],
            settings: CollectionSettings { thumb_w: 100, thumb_h: 100, cache_w: 1, cache_h: 1 },
            statistics: CollectionStatistics::default(),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn discovers_new_images_and_fans_out_derivative_envelopes() {
        let dir = tempdir().unwrap();
        let lib_root = dir.path().join("library");
        std::fs::create_dir_all(lib_root.join("A")).unwrap();
        std::fs::write(lib_root.join("A/a.png"), solid_png(400, 300)).unwrap();
        std::fs::write(lib_root.join("A/b.png"), solid_png(200, 200)).unwrap();

        let library_id = Id::generate();
        let collection_id = Id::generate();
        let catalog = Arc::new(FakeCatalog::default());
        *catalog.library.lock().unwrap() = Some(library(library_id, &lib_root));
        *catalog.collection.lock().unwrap() = Some(collection(collection_id, library_id, vec![]));
        let bus = Arc::new(FakeBus::default());

        let consumer = CollectionScanConsumer::new(
            catalog.clone(),
            bus.clone(),
            Arc::new(crate::consumers::StandardImageCodec),
        );

        let msg = gallerist_model::CollectionScan {
            collection_id,
            collection_path: "A".into(),
            force_rescan: false,
            thumbnail_w: 100,
            thumbnail_h: 100,
            cache_w: 1,
            cache_h: 1,
            job_id: JobId::generate(),
        };
        consumer.handle(msg).await.unwrap();

        assert_eq!(catalog.pushed_images.lock().unwrap().len(), 2);
        let published = bus.published.lock().unwrap();
        assert_eq!(published.len(), 4);
        assert_eq!(
            published.iter().filter(|e| matches!(e, Envelope::ThumbnailGen { .. })).count(),
            2
        );
        assert_eq!(
            published.iter().filter(|e| matches!(e, Envelope::CacheGen { .. })).count(),
            2
        );
        let delta = catalog.stats_delta.lock().unwrap().unwrap();
        assert_eq!(delta.media_items, 2);
    }

    #[tokio::test]
    async fn a_redelivered_scan_does_not_re_persist_or_re_queue_an_already_known_image() {
        let dir = tempdir().unwrap();
        let lib_root = dir.path().join("library");
        std::fs::create_dir_all(lib_root.join("A")).unwrap();
        std::fs::write(lib_root.join("A/a.png"), solid_png(400, 300)).unwrap();

        let library_id = Id::generate();
        let collection_id = Id::generate();
        let catalog = Arc::new(FakeCatalog::default());
        *catalog.library.lock().unwrap() = Some(library(library_id, &lib_root));
        *catalog.collection.lock().unwrap() = Some(collection(
            collection_id,
            library_id,
            vec![ImageEmbedded {
                id: Id::generate(),
                filename: "a.png".into(),
                relative_path: "A/a.png".into(),
                size_bytes: 123,
                width: 400,
                height: 300,
                format: "png".into(),
                added_at: Utc::now(),
                is_deleted: false,
            }],
        ));
        let bus = Arc::new(FakeBus::default());

        let consumer = CollectionScanConsumer::new(
            catalog.clone(),
            bus.clone(),
            Arc::new(crate::consumers::StandardImageCodec),
        );

        let msg = gallerist_model::CollectionScan {
            collection_id,
            collection_path: "A".into(),
            force_rescan: false,
            thumbnail_w: 100,
            thumbnail_h: 100,
            cache_w: 1,
            cache_h: 1,
            job_id: JobId::generate(),
        };
        consumer.handle(msg).await.unwrap();

        assert!(catalog.pushed_images.lock().unwrap().is_empty());
        assert!(bus.published.lock().unwrap().is_empty());
        assert!(catalog.stats_delta.lock().unwrap().is_none());
    }

    fn write_zip(path: &std::path::Path, entries: &[(&str, &[u8])]) {
        use std::io::Write;
        use zip::write::SimpleFileOptions;
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn rejects_an_archive_exceeding_the_configured_entry_limit() {
        let dir = tempdir().unwrap();
        let lib_root = dir.path().join("library");
        std::fs::create_dir_all(&lib_root).unwrap();
        write_zip(
            &lib_root.join("book.cbz"),
            &[("a.png", &solid_png(400, 300)), ("b.png", &solid_png(200, 200))],
        );

        let library_id = Id::generate();
        let collection_id = Id::generate();
        let catalog = Arc::new(FakeCatalog::default());
        *catalog.library.lock().unwrap() = Some(library(library_id, &lib_root));
        *catalog.collection.lock().unwrap() = Some(Collection {
            kind: CollectionType::Cbz,
            path: "book.cbz".into(),
            ..collection(collection_id, library_id, vec![])
        });
        let bus = Arc::new(FakeBus::default());

        let consumer = CollectionScanConsumer::with_archive_config(
            catalog.clone(),
            bus.clone(),
            Arc::new(crate::consumers::StandardImageCodec),
            gallerist_config::ArchiveConfig {
                max_entries: Some(1),
                max_uncompressed_bytes: None,
            },
        );

        let msg = gallerist_model::CollectionScan {
            collection_id,
            collection_path: "book.cbz".into(),
            force_rescan: false,
            thumbnail_w: 100,
            thumbnail_h: 100,
            cache_w: 1,
            cache_h: 1,
            job_id: JobId::generate(),
        };

        let err = consumer.handle(msg).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArchive(_)));
        assert!(catalog.pushed_images.lock().unwrap().is_empty());
        assert!(bus.published.lock().unwrap().is_empty());
    }
}
