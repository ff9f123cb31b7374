//! The scan-classification decision table (§4.6), isolated as a pure
//! function so every row can be exercised without a database.

/// Inputs the orchestrator already has in hand once it has looked up (or
/// failed to find) the existing collection for a candidate path.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput {
    pub collection_exists: bool,
    pub overwrite_existing: bool,
    pub resume_incomplete: bool,
    pub has_images: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// No existing collection: create one and queue a full scan.
    Create,
    /// Existing collection, `overwriteExisting`: wipe derivatives and
    /// re-queue a forced rescan.
    ClearAndRescan,
    /// Existing, not overwritten, resumable, already has images: queue only
    /// the missing derivatives directly rather than a full rescan.
    Resume,
    /// Queue a normal (non-forced) `CollectionScan`.
    QueueRescan,
    /// Nothing to do.
    Skip,
}

/// Applies the classification table from §4.6 row by row.
pub fn classify(input: ClassificationInput) -> Action {
    if !input.collection_exists {
        return Action::Create;
    }
    if input.overwrite_existing {
        return Action::ClearAndRescan;
    }
    if input.resume_incomplete {
        return if input.has_images {
            Action::Resume
        } else {
            Action::QueueRescan
        };
    }
    if input.has_images {
        Action::Skip
    } else {
        Action::QueueRescan
    }
}
