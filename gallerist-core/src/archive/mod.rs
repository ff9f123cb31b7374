//! Archive & filesystem probing: folder enumeration, archive-kind detection,
//! entry enumeration with OS-metadata filtering, and the `archive#entry`
//! path encoding every consumer relies on.

mod entry_ref;
mod fs_probe;
mod reader;

pub use entry_ref::{fix_legacy_entry_path, normalize_entry_ref, parse_entry_ref};
pub use fs_probe::{enumerate_folders, has_supported_image, is_archive, is_macosx_metadata};
pub use reader::{open_reader, read_source_bytes, ArchiveEntry, ArchiveReader};

use std::fmt;

/// Closed set of archive kinds this probe recognizes. `Cbz`/`Cbr` are
/// comic-book containers that are byte-for-byte Zip/Rar under a different
/// extension, so they dispatch to the same readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZ,
    Cbz,
    Cbr,
}

impl ArchiveKind {
    /// The extension-sniffing lookup used by [`is_archive`].
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            "7z" => Some(Self::SevenZ),
            "cbz" => Some(Self::Cbz),
            "cbr" => Some(Self::Cbr),
            _ => None,
        }
    }

    /// Which underlying reader implementation handles this kind.
    pub fn family(self) -> ArchiveFamily {
        match self {
            Self::Zip | Self::Cbz => ArchiveFamily::Zip,
            Self::Rar | Self::Cbr => ArchiveFamily::Rar,
            Self::SevenZ => ArchiveFamily::SevenZ,
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::SevenZ => "7z",
            Self::Cbz => "cbz",
            Self::Cbr => "cbr",
        };
        f.write_str(s)
    }
}

/// Which concrete archive-reading crate backs an [`ArchiveKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFamily {
    Zip,
    Rar,
    SevenZ,
}

/// Supported raster image extensions, matching spec's MIME list
/// (`image/jpeg`, `image/png`, `image/gif`, `image/bmp`, `image/webp`).
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

pub fn is_supported_image_extension(ext: &str) -> bool {
    let lowered = ext.to_ascii_lowercase();
    SUPPORTED_IMAGE_EXTENSIONS.contains(&lowered.as_str())
}
