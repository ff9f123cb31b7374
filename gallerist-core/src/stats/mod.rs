//! Statistics Aggregator (C11): `incrementLibraryStats`/`markLibraryScanned`
//! as single atomic catalog operations. Thumbnails/cache files are not
//! counted here — see cache-folder stats (§4.9) for those.

use std::sync::Arc;

use gallerist_model::LibraryId;

use crate::catalog::{CatalogGateway, LibraryStatsDelta};
use crate::error::Result;

/// Thin pass-through over [`CatalogGateway`]'s library-statistics
/// operations, kept as its own type so C6/C7 depend on a narrow seam rather
/// than the full gateway trait.
pub struct StatsAggregator {
    catalog: Arc<dyn CatalogGateway>,
}

impl StatsAggregator {
    pub fn new(catalog: Arc<dyn CatalogGateway>) -> Self {
        Self { catalog }
    }

    pub async fn increment_library_stats(&self, library_id: LibraryId, delta: LibraryStatsDelta) -> Result<()> {
        self.catalog.increment_library_stats(library_id, delta).await
    }

    pub async fn mark_library_scanned(&self, library_id: LibraryId) -> Result<()> {
        self.catalog.mark_library_scanned(library_id).await
    }
}
