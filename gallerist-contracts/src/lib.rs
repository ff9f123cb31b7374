//! Trait surfaces shared between the catalog, navigation index, and
//! orchestration layers of `gallerist-core`.

pub mod entry_ref;
pub mod sort;

pub mod prelude {
    pub use super::entry_ref::EntrySource;
    pub use super::sort::{SortDirection, SortField, Sortable};
}
