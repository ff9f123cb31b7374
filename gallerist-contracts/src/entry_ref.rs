/// Marker trait for types that can resolve to a byte stream, whether they
/// live directly on the filesystem or inside an archive entry. Implemented
/// by `gallerist-core::archive` readers; kept here so consumers can depend
/// on the contract without pulling in concrete archive-crate types.
pub trait EntrySource: Send + Sync {
    /// `true` if this ref points inside an archive (`archive#entry`), `false`
    /// if it is a plain filesystem path.
    fn is_archived(&self) -> bool;
}
