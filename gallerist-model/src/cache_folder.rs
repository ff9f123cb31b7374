use serde::{Deserialize, Serialize};

use crate::ids::{CacheFolderId, CollectionId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheFolder {
    pub id: CacheFolderId,
    pub path: String,
    pub priority: i32,
    pub is_active: bool,
    pub current_size_bytes: i64,
    pub total_files: i64,
    pub total_collections: i64,
    pub cached_collection_ids: Vec<CollectionId>,
}

impl CacheFolder {
    /// Invariant 3 of §8: `totalCollections == |cachedCollectionIds|`.
    pub fn check_invariant(&self) -> bool {
        self.total_collections == self.cached_collection_ids.len() as i64
    }

    /// Whether this folder can accept more cached files under `soft_cap_bytes`.
    pub fn has_capacity(&self, soft_cap_bytes: i64) -> bool {
        self.is_active && self.current_size_bytes < soft_cap_bytes
    }
}
