use std::path::PathBuf;

/// Filesystem layout for persisted derivatives (§6).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub cache_root: PathBuf,
    pub thumbnail_root: PathBuf,
    /// Soft size cap applied when selecting an active cache folder (C9).
    pub cache_folder_soft_cap_bytes: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("./data/cache"),
            thumbnail_root: PathBuf::from("./data/thumbnails"),
            cache_folder_soft_cap_bytes: 50 * 1024 * 1024 * 1024,
        }
    }
}
