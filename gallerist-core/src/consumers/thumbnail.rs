use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use gallerist_model::{ThumbnailEmbedded, ThumbnailGen};
use tracing::warn;

use crate::archive;
use crate::catalog::{CatalogGateway, StageCounterField};
use crate::error::Result;

use super::codec::ImageCodec;

/// Thumbnail Consumer (C8): one message per image, idempotent under
/// redelivery, reports its outcome on `stages.thumbnail` of the owning job.
pub struct ThumbnailConsumer {
    catalog: Arc<dyn CatalogGateway>,
    codec: Arc<dyn ImageCodec>,
    thumbnail_root: PathBuf,
}

impl ThumbnailConsumer {
    pub fn new(catalog: Arc<dyn CatalogGateway>, codec: Arc<dyn ImageCodec>, thumbnail_root: PathBuf) -> Self {
        Self {
            catalog,
            codec,
            thumbnail_root,
        }
    }

    pub async fn handle(&self, msg: ThumbnailGen) -> Result<()> {
        let image_path = archive::fix_legacy_entry_path(&msg.image_path);

        let collection = self
            .catalog
            .get_collection(msg.collection_id)
            .await?
            .ok_or_else(|| crate::error::CoreError::NotFound(format!("collection {}", msg.collection_id.to_hex())))?;
        let already_present = collection.thumbnails.iter().any(|t| {
            t.image_id == msg.image_id
                && t.width == msg.width
                && t.height == msg.height
                && Path::new(&t.path).exists()
        });
        if already_present {
            self.catalog
                .increment_stage(msg.job_id, "thumbnail", StageCounterField::Skipped, 1)
                .await?;
            return Ok(());
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
                warn!(image_id = %msg.image_id.to_hex(), error = %err, "thumbnail source unreadable");
                self.catalog
                    .increment_stage(msg.job_id, "thumbnail", StageCounterField::Failed, 1)
                    .await?;
                return Ok(());
            }
        };

        let decoded = match self.codec.decode(&bytes) {
            Ok(d) => d,
            Err(err) => {
                warn!(image_id = %msg.image_id.to_hex(), error = %err, "thumbnail decode failed");
                self.catalog
                    .increment_stage(msg.job_id, "thumbnail", StageCounterField::Failed, 1)
                    .await?;
                return Ok(());
            }
        };

        let resized = self.codec.resize_to_fit(&decoded, msg.width, msg.height);
        let encoded = self.codec.encode_webp(&resized, 85)?;

        let out_dir = self.thumbnail_root.join(msg.collection_id.to_hex());
        std::fs::create_dir_all(&out_dir)?;
        let out_name = format!(
            "{}_thumb_{}x{}.webp",
            msg.image_id.to_hex(),
            msg.width,
            msg.height
        );
        let out_path = out_dir.join(&out_name);
        std::fs::write(&out_path, &encoded)?;

        let (w, h) = {
            use image::GenericImageView;
            resized.dimensions()
        };

        let record = ThumbnailEmbedded {
            image_id: msg.image_id,
            width: w,
            height: h,
            path: out_path.to_string_lossy().to_string(),
            size_bytes: encoded.len() as i64,
            created_at: Utc::now(),
        };
        self.catalog
            .push_thumbnail(msg.collection_id, record)
            .await?;
        self.catalog
            .increment_stage(msg.job_id, "thumbnail", StageCounterField::Completed, 1)
            .await?;
        Ok(())
    }
}
