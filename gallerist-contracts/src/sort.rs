use gallerist_model::CollectionId;

/// The sort fields the navigation index whitelists (§4.2). Every ranked set
/// the index maintains is keyed by one of these plus a [`SortDirection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortField {
    UpdatedAt,
    CreatedAt,
    Name,
    ImageCount,
    TotalSize,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::UpdatedAt,
        SortField::CreatedAt,
        SortField::Name,
        SortField::ImageCount,
        SortField::TotalSize,
    ];

    /// The redis key segment for this field, used to build `idx:f:d` keys.
    pub fn key_segment(self) -> &'static str {
        match self {
            SortField::UpdatedAt => "updatedAt",
            SortField::CreatedAt => "createdAt",
            SortField::Name => "name",
            SortField::ImageCount => "imageCount",
            SortField::TotalSize => "totalSize",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn key_segment(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A catalog-backed type that can supply a navigation-index score for every
/// whitelisted [`SortField`]. `gallerist-core`'s Postgres projections and the
/// navigation index summary both implement this so page/rebuild logic is
/// written once against the trait rather than duplicated per concrete type.
pub trait Sortable {
    fn id(&self) -> CollectionId;
    /// Numeric score for `field`, *before* direction is applied. `Name` is
    /// the one field with no meaningful numeric score; callers must route it
    /// through the lexicographic path (`ZRANGEBYLEX`) instead of calling this.
    fn numeric_score(&self, field: SortField) -> Option<f64>;
    /// Lowercased name, used as the lexicographic sort key for `SortField::Name`.
    fn name_key(&self) -> String;
}
