//! Navigation Index: ranked sets of collection summaries per sort field,
//! giving O(log N) position/neighbor queries. Backed by Redis
//! ([`redis_index`]). [`RedisNavigationIndex`] maintains one global ranked
//! set per sort field × direction, not yet the per-library/per-type sets a
//! fully scoped index would need; a Redis error from `page`/`navigation`/
//! `siblings` propagates to the caller rather than degrading to a catalog
//! query — `is_valid`/`rebuild` are the only recovery path, run once at
//! startup and whenever the index is found stale.

mod redis_index;
mod siblings;

pub use redis_index::RedisNavigationIndex;
pub use siblings::siblings_window;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallerist_contracts::sort::{Sortable, SortDirection, SortField};
use gallerist_model::{Collection, CollectionId, CollectionType, LibraryId};

use crate::catalog::{CatalogGateway, CollectionFilter};
use crate::error::Result;

impl From<&Collection> for CollectionSummary {
    fn from(c: &Collection) -> Self {
        CollectionSummary {
            id: c.id,
            library_id: c.library_id,
            name: c.name.clone(),
            kind: c.kind,
            image_count: c.statistics.image_count,
            total_size: c.statistics.total_size_bytes,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// The minimal fields needed to render a collection list row, mirroring
/// the spec's per-collection summary hash (`data:{id}`).
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub library_id: LibraryId,
    pub name: String,
    pub kind: CollectionType,
    pub image_count: i64,
    pub total_size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sortable for CollectionSummary {
    fn id(&self) -> CollectionId {
        self.id
    }

    fn numeric_score(&self, field: SortField) -> Option<f64> {
        match field {
            SortField::UpdatedAt => Some(self.updated_at.timestamp() as f64),
            SortField::CreatedAt => Some(self.created_at.timestamp() as f64),
            SortField::ImageCount => Some(self.image_count as f64),
            SortField::TotalSize => Some(self.total_size as f64),
            SortField::Name => None,
        }
    }

    fn name_key(&self) -> String {
        self.name.to_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub ids: Vec<CollectionId>,
    pub total: u64,
    pub position_of_first: u64,
}

#[derive(Debug, Clone)]
pub struct Navigation {
    pub prev_id: Option<CollectionId>,
    pub next_id: Option<CollectionId>,
    pub position: u64,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct Siblings {
    pub ids: Vec<CollectionId>,
    pub position: u64,
    pub total: u64,
}

#[async_trait]
pub trait NavigationIndex: Send + Sync {
    async fn add_or_update(&self, summary: &CollectionSummary) -> Result<()>;
    async fn remove(&self, id: CollectionId) -> Result<()>;
    async fn page(
        &self,
        field: SortField,
        direction: SortDirection,
        page_num: u64,
        page_size: u64,
    ) -> Result<Page>;
    async fn navigation(
        &self,
        id: CollectionId,
        field: SortField,
        direction: SortDirection,
    ) -> Result<Option<Navigation>>;
    async fn siblings(
        &self,
        id: CollectionId,
        field: SortField,
        direction: SortDirection,
        page_size: u64,
    ) -> Result<Option<Siblings>>;
    async fn get_thumbnail(&self, id: CollectionId) -> Result<Option<Vec<u8>>>;
    async fn set_thumbnail(&self, id: CollectionId, bytes: &[u8], ttl_secs: u64) -> Result<()>;
    async fn batch_cache_thumbnails(&self, items: &[(CollectionId, Vec<u8>)], ttl_secs: u64) -> Result<()>;
    async fn is_valid(&self) -> Result<bool>;

    /// Repopulates every ranked set from the catalog, scanning collections
    /// in fixed-size batches rather than loading the whole library at once.
    /// Run after `is_valid()` reports `false` (cold Redis, schema bump).
    async fn rebuild(&self, catalog: &dyn CatalogGateway, batch_size: i64) -> Result<()>;
}
