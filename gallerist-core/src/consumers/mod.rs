//! Stage consumers: Collection-Scan (C7), Thumbnail (C8), Cache (C9). Each
//! handles exactly one message, is idempotent under at-least-once delivery,
//! and reports its outcome back to the job it was tagged with via
//! [`crate::jobs::JobTracker`].

mod cache;
mod codec;
mod collection_scan;
mod thumbnail;

pub use cache::CacheConsumer;
pub use codec::{ImageCodec, StandardImageCodec};
pub use collection_scan::CollectionScanConsumer;
pub use thumbnail::ThumbnailConsumer;
