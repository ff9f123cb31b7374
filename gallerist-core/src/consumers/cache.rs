use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use gallerist_model::{CacheFolder, CacheGen, CacheImageEmbedded};
use tracing::warn;

use crate::archive;
use crate::catalog::{CatalogGateway, StageCounterField};
use crate::error::Result;

use super::codec::ImageCodec;

/// Cache Consumer (C9): like [`super::ThumbnailConsumer`] but targets a
/// larger scaled copy whose storage folder is chosen by the CacheFolder
/// selector (§4.9) rather than a fixed root.
pub struct CacheConsumer {
    catalog: Arc<dyn CatalogGateway>,
    codec: Arc<dyn ImageCodec>,
    soft_cap_bytes: i64,
}

impl CacheConsumer {
    pub fn new(catalog: Arc<dyn CatalogGateway>, codec: Arc<dyn ImageCodec>, soft_cap_bytes: i64) -> Self {
        Self {
            catalog,
            codec,
            soft_cap_bytes,
        }
    }

    /// Active folders under the soft cap, ordered by priority, then picks
    /// one deterministically from `imageId` so redelivery lands on the same
    /// folder (barring a change to the active folder set).
    fn select_folder<'a>(
        &self,
        candidates: &'a [CacheFolder],
        image_id: gallerist_model::ImageId,
    ) -> Option<&'a CacheFolder> {
        select_folder_from(candidates, self.soft_cap_bytes, image_id)
    }

    pub async fn handle(&self, msg: CacheGen) -> Result<()> {
        let image_path = archive::fix_legacy_entry_path(&msg.image_path);

        let collection = self
            .catalog
            .get_collection(msg.collection_id)
            .await?
            .ok_or_else(|| crate::error::CoreError::NotFound(format!("collection {}", msg.collection_id.to_hex())))?;
        if !msg.force_regenerate {
            let already_present = collection.cache_images.iter().any(|c| {
                c.image_id == msg.image_id
                    && c.width == msg.width
                    && c.height == msg.height
                    && Path::new(&c.path).exists()
            });
            if already_present {
                self.catalog
                    .increment_stage(msg.job_id, "cache", StageCounterField::Skipped, 1)
                    .await?;
                return Ok(());
            }
        }

        let library = self
            .catalog
            .get_library(collection.library_id)
            .await?
            .ok_or_else(|| crate::error::CoreError::NotFound(format!("library {}", collection.library_id.to_hex())))?;
        let library_root = Path::new(&library.root_path);

        let bytes = match archive::read_source_bytes(library_root, &image_path) {
            Ok(b) => b,
            Err(err) => {
                warn!(image_id = %msg.image_id.to_hex(), error = %err, "cache source unreadable");
                self.catalog
                    .increment_stage(msg.job_id, "cache", StageCounterField::Failed, 1)
                    .await?;
                return Ok(());
            }
        };

        let decoded = match self.codec.decode(&bytes) {
            Ok(d) => d,
            Err(err) => {
                warn!(image_id = %msg.image_id.to_hex(), error = %err, "cache decode failed");
                self.catalog
                    .increment_stage(msg.job_id, "cache", StageCounterField::Failed, 1)
                    .await?;
                return Ok(());
            }
        };

        let folders = self.catalog.list_active_cache_folders().await?;
        let folder = match self.select_folder(&folders, msg.image_id) {
            Some(f) => f,
            None => {
                warn!(image_id = %msg.image_id.to_hex(), "no cache folder with spare capacity");
                self.catalog
                    .increment_stage(msg.job_id, "cache", StageCounterField::Failed, 1)
                    .await?;
                return Ok(());
            }
        };

        if msg.format != "webp" {
            warn!(image_id = %msg.image_id.to_hex(), format = %msg.format, "unsupported cache image format");
            self.catalog
                .increment_stage(msg.job_id, "cache", StageCounterField::Failed, 1)
                .await?;
            return Ok(());
        }

        let resized = self.codec.resize_to_fit(&decoded, msg.width, msg.height);
        let encoded = self.codec.encode_webp(&resized, msg.quality)?;

        let out_dir = PathBuf::from(&folder.path).join(msg.collection_id.to_hex());
        std::fs::create_dir_all(&out_dir)?;
        let out_name = format!(
            "{}_cache_{}x{}.{}",
            msg.image_id.to_hex(),
            msg.width,
            msg.height,
            msg.format
        );
        let out_path = msg
            .cache_path
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| out_dir.join(&out_name));
        std::fs::write(&out_path, &encoded)?;

        let (w, h) = {
            use image::GenericImageView;
            resized.dimensions()
        };
        let size_bytes = encoded.len() as i64;

        let record = CacheImageEmbedded {
            image_id: msg.image_id,
            width: w,
            height: h,
            path: out_path.to_string_lossy().to_string(),
            size_bytes,
            created_at: Utc::now(),
        };
        self.catalog
            .push_cache_image(msg.collection_id, record)
            .await?;
        self.catalog
            .record_cache_file(folder.id, msg.collection_id, size_bytes)
            .await?;
        self.catalog
            .increment_stage(msg.job_id, "cache", StageCounterField::Completed, 1)
            .await?;
        Ok(())
    }
}

fn select_folder_from(
    candidates: &[CacheFolder],
    soft_cap_bytes: i64,
    image_id: gallerist_model::ImageId,
) -> Option<&CacheFolder> {
    let mut eligible: Vec<&CacheFolder> = candidates
        .iter()
        .filter(|f| f.has_capacity(soft_cap_bytes))
        .collect();
    eligible.sort_by_key(|f| f.priority);
    if eligible.is_empty() {
        return None;
    }
    let index = (image_id.as_u128() % eligible.len() as u128) as usize;
    Some(eligible[index])
}
