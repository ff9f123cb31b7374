/// Settings for the navigation index (C2).
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Catalog page size used while rebuilding the index (`index.rebuildBatchSize`, default 100).
    pub rebuild_batch_size: u32,
    /// Thumbnail cache expiry in seconds (`index.thumbTTL`, default 30 days).
    pub thumb_ttl_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            rebuild_batch_size: 100,
            thumb_ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}
