//! Opaque 12-byte entity identifiers.
//!
//! Every entity in the catalog (libraries, collections, jobs, ...) is keyed
//! by a 12-byte id: a 4-byte big-endian unix-second timestamp followed by 8
//! random bytes. This mirrors the shape of a document-store ObjectId while
//! staying a plain value type with no driver dependency. A zero-sized phantom
//! tag keeps ids for different entity kinds from being accidentally swapped,
//! the same role `LibraryId`/`MovieID`/... play as distinct newtypes in a
//! typed-id scheme.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::ModelError;

/// Marker for [`Id`] so ids of different entity kinds are distinct types.
pub trait IdKind {
    /// Short tag used only in `Debug` output, e.g. `"Library"`.
    const TAG: &'static str;
}

macro_rules! id_kind {
    ($name:ident, $tag:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name;
        impl IdKind for $name {
            const TAG: &'static str = $tag;
        }
    };
}

id_kind!(LibraryKind, "Library");
id_kind!(CollectionKind, "Collection");
id_kind!(ImageKind, "Image");
id_kind!(JobKind, "Job");
id_kind!(ScheduledJobKind, "ScheduledJob");
id_kind!(ScheduledJobRunKind, "ScheduledJobRun");
id_kind!(CacheFolderKind, "CacheFolder");

/// An opaque 12-byte identifier tagged with the entity kind it names.
pub struct Id<K>([u8; 12], PhantomData<K>);

impl<K> Id<K> {
    /// Builds an id from raw bytes (e.g. when hydrating from storage).
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes, PhantomData)
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Generates a fresh id: a big-endian unix-second timestamp prefix plus
    /// random tail, so ids sort roughly by creation time.
    pub fn generate() -> Self {
        let now = chrono::Utc::now().timestamp() as u32;
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&now.to_be_bytes());
        let tail: [u8; 8] = rand_tail();
        bytes[4..12].copy_from_slice(&tail);
        Self(bytes, PhantomData)
    }

    /// Lowercase hex encoding, 24 characters.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// The 12 bytes zero-extended into a `u128`, for callers that need a
    /// deterministic numeric spread over an id (e.g. folder selection) and
    /// don't care about its time-sortable structure.
    pub fn as_u128(&self) -> u128 {
        let mut buf = [0u8; 16];
        buf[4..16].copy_from_slice(&self.0);
        u128::from_be_bytes(buf)
    }
}

fn rand_tail() -> [u8; 8] {
    // A minimal xorshift PRNG seeded from the current instant is sufficient
    // here: collision avoidance only needs spread, not cryptographic
    // unpredictability, and avoids pulling in `rand` for one call site.
    use std::cell::Cell;
    thread_local! {
        static STATE: Cell<u64> = Cell::new(0x9E3779B97F4A7C15);
    }
    STATE.with(|s| {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        let mut x = s.get() ^ seed;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        s.set(x);
        x.to_be_bytes()[0..8].try_into().unwrap()
    })
}

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K> Copy for Id<K> {}
impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<K> Eq for Id<K> {}
impl<K> std::hash::Hash for Id<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::TAG, self.to_hex())
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl<K> FromStr for Id<K> {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 {
            return Err(ModelError::InvalidId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ModelError::InvalidId(s.to_string()))?;
        }
        Ok(Self(bytes, PhantomData))
    }
}

impl<K> serde::Serialize for Id<K> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de, K> serde::Deserialize<'de> for Id<K> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

pub type LibraryId = Id<LibraryKind>;
pub type CollectionId = Id<CollectionKind>;
pub type ImageId = Id<ImageKind>;
pub type JobId = Id<JobKind>;
pub type ScheduledJobId = Id<ScheduledJobKind>;
pub type ScheduledJobRunId = Id<ScheduledJobRunKind>;
pub type CacheFolderId = Id<CacheFolderKind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let id: LibraryId = Id::generate();
        let hex = id.to_hex();
        let parsed: LibraryId = hex.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!("not-hex".parse::<LibraryId>().is_err());
    }

    #[test]
    fn serializes_as_hex_string() {
        let id: CollectionId = Id::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
    }
}
