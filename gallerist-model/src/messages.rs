use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{CollectionId, JobId, LibraryId, ScheduledJobId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    Full,
    Incremental,
}

/// Published by the scheduler (or manually) to kick off a library scan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryScan {
    pub library_id: LibraryId,
    pub library_path: String,
    pub scan_type: ScanType,
    pub include_subfolders: bool,
    pub resume_incomplete: bool,
    pub overwrite_existing: bool,
    pub scheduled_job_id: Option<ScheduledJobId>,
    pub job_run_id: Option<String>,
}

/// Published by the scan orchestrator for each collection it classifies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionScan {
    pub collection_id: CollectionId,
    pub collection_path: String,
    pub force_rescan: bool,
    pub thumbnail_w: u32,
    pub thumbnail_h: u32,
    pub cache_w: u32,
    pub cache_h: u32,
    pub job_id: JobId,
}

/// Published once per image needing a thumbnail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThumbnailGen {
    pub image_id: crate::ids::ImageId,
    pub collection_id: CollectionId,
    pub image_path: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub job_id: JobId,
}

/// Published once per image needing a scaled cache copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheGen {
    pub image_id: crate::ids::ImageId,
    pub collection_id: CollectionId,
    pub image_path: String,
    pub cache_path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub format: String,
    pub force_regenerate: bool,
    pub job_id: JobId,
}

/// The tagged envelope wrapping every message placed on the bus. `message_type`
/// and `correlation_id` are carried on every variant per §6.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "messageType")]
pub enum Envelope {
    LibraryScan {
        correlation_id: Uuid,
        #[serde(flatten)]
        body: LibraryScan,
    },
    CollectionScan {
        correlation_id: Uuid,
        #[serde(flatten)]
        body: CollectionScan,
    },
    ThumbnailGen {
        correlation_id: Uuid,
        #[serde(flatten)]
        body: ThumbnailGen,
    },
    CacheGen {
        correlation_id: Uuid,
        #[serde(flatten)]
        body: CacheGen,
    },
}

impl Envelope {
    pub fn correlation_id(&self) -> Uuid {
        match self {
            Envelope::LibraryScan { correlation_id, .. }
            | Envelope::CollectionScan { correlation_id, .. }
            | Envelope::ThumbnailGen { correlation_id, .. }
            | Envelope::CacheGen { correlation_id, .. } => *correlation_id,
        }
    }

    /// The logical queue this envelope is routed to.
    pub fn queue_name(&self) -> &'static str {
        match self {
            Envelope::LibraryScan { .. } => "library_scan_queue",
            Envelope::CollectionScan { .. } => "collection_scan_queue",
            Envelope::ThumbnailGen { .. } => "thumbnail_generation_queue",
            Envelope::CacheGen { .. } => "cache_generation_queue",
        }
    }
}
