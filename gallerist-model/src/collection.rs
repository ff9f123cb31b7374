use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CollectionId, ImageId, LibraryId};

/// The on-disk shape a collection was discovered as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CollectionType {
    Folder,
    Zip,
    Rar,
    SevenZ,
    Cbz,
    Cbr,
}

impl CollectionType {
    /// Whether this type is read through an archive reader rather than the
    /// plain filesystem.
    pub fn is_archive(self) -> bool {
        !matches!(self, CollectionType::Folder)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub library_id: LibraryId,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: CollectionType,
    pub images: Vec<ImageEmbedded>,
    pub thumbnails: Vec<ThumbnailEmbedded>,
    pub cache_images: Vec<CacheImageEmbedded>,
    pub settings: CollectionSettings,
    pub statistics: CollectionStatistics,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    /// Images not yet covered by a thumbnail of any dimension.
    pub fn missing_thumbnails(&self) -> Vec<&ImageEmbedded> {
        self.images
            .iter()
            .filter(|img| !img.is_deleted)
            .filter(|img| !self.thumbnails.iter().any(|t| t.image_id == img.id))
            .collect()
    }

    /// Images not yet covered by a cache image of any dimension.
    pub fn missing_cache_images(&self) -> Vec<&ImageEmbedded> {
        self.images
            .iter()
            .filter(|img| !img.is_deleted)
            .filter(|img| !self.cache_images.iter().any(|c| c.image_id == img.id))
            .collect()
    }

    /// Checks the two embedded-array invariants from the data model:
    /// thumbnails/cache images never outnumber images, and every derivative
    /// references an image that actually exists on this collection.
    pub fn check_invariants(&self) -> bool {
        if self.thumbnails.len() > self.images.len() {
            return false;
        }
        if self.cache_images.len() > self.images.len() {
            return false;
        }
        let image_ids: std::collections::HashSet<_> = self.images.iter().map(|i| i.id).collect();
        self.thumbnails.iter().all(|t| image_ids.contains(&t.image_id))
            && self.cache_images.iter().all(|c| image_ids.contains(&c.image_id))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub thumb_w: u32,
    pub thumb_h: u32,
    pub cache_w: u32,
    pub cache_h: u32,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CollectionStatistics {
    pub image_count: i64,
    pub total_size_bytes: i64,
}

/// A single source image belonging to a collection.
///
/// `relative_path` uses `#` to separate an archive file from the entry
/// inside it (e.g. `sub/book.zip#page01.jpg`); see
/// [`crate::entry_ref::normalize_entry_ref`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageEmbedded {
    pub id: ImageId,
    pub filename: String,
    pub relative_path: String,
    pub size_bytes: i64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub added_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThumbnailEmbedded {
    pub image_id: ImageId,
    pub width: u32,
    pub height: u32,
    pub path: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheImageEmbedded {
    pub image_id: ImageId,
    pub width: u32,
    pub height: u32,
    pub path: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Id;

    fn image(id: ImageId) -> ImageEmbedded {
        ImageEmbedded {
            id,
            filename: "a.jpg".into(),
            relative_path: "a.jpg".into(),
            size_bytes: 10,
            width: 100,
            height: 100,
            format: "jpeg".into(),
            added_at: Utc::now(),
            is_deleted: false,
        }
    }

    #[test]
    fn missing_thumbnails_excludes_covered_images() {
        let img1: ImageId = Id::generate();
        let img2: ImageId = Id::generate();
        let mut col = Collection {
            id: Id::generate(),
            library_id: Id::generate(),
            name: "A".into(),
            path: "/A".into(),
            kind: CollectionType::Folder,
            images: vec![image(img1), image(img2)],
            thumbnails: vec![],
            cache_images: vec![],
            settings: CollectionSettings { thumb_w: 1, thumb_h: 1, cache_w: 1, cache_h: 1 },
            statistics: CollectionStatistics::default(),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(col.missing_thumbnails().len(), 2);
        col.thumbnails.push(ThumbnailEmbedded {
            image_id: img1,
            width: 320,
            height: 320,
            path: "t1".into(),
            size_bytes: 1,
            created_at: Utc::now(),
        });
        assert_eq!(col.missing_thumbnails().len(), 1);
        assert_eq!(col.missing_thumbnails()[0].id, img2);
        assert!(col.check_invariants());
    }

    #[test]
    fn invariant_fails_when_derivative_outnumbers_images() {
        let img1: ImageId = Id::generate();
        let col = Collection {
            id: Id::generate(),
            library_id: Id::generate(),
            name: "A".into(),
            path: "/A".into(),
            kind: CollectionType::Folder,
            images: vec![],
            thumbnails: vec![ThumbnailEmbedded {
                image_id: img1,
                width: 1,
                height: 1,
                path: "x".into(),
                size_bytes: 1,
                created_at: Utc::now(),
            }],
            cache_images: vec![],
            settings: CollectionSettings { thumb_w: 1, thumb_h: 1, cache_w: 1, cache_h: 1 },
            statistics: CollectionStatistics::default(),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!col.check_invariants());
    }
}
