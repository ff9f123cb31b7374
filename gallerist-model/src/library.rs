use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LibraryId;

/// A top-level media library rooted at a filesystem path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    pub root_path: String,
    pub owner_id: String,
    pub settings: LibrarySettings,
    pub statistics: LibraryStatistics,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LibrarySettings {
    pub auto_scan: bool,
    pub default_thumb_w: u32,
    pub default_thumb_h: u32,
    pub default_cache_w: u32,
    pub default_cache_h: u32,
    pub enable_cache: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            auto_scan: true,
            default_thumb_w: 320,
            default_thumb_h: 320,
            default_cache_w: 1600,
            default_cache_h: 1600,
            enable_cache: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LibraryStatistics {
    pub total_collections: i64,
    pub total_media_items: i64,
    pub total_size_bytes: i64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub scan_count: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
}
