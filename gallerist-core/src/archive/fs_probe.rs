use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{is_supported_image_extension, reader, ArchiveKind};

/// Recursively lists directory paths under `root`. When `recurse` is false
/// only `root` itself is returned (callers decide per-directory whether to
/// descend further, mirroring the scan orchestrator's per-collection walk).
pub fn enumerate_folders(root: &Path, recurse: bool) -> Result<Vec<PathBuf>> {
    let mut folders = vec![root.to_path_buf()];
    if !recurse {
        return Ok(folders);
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                folders.push(path.clone());
                stack.push(path);
            }
        }
    }
    Ok(folders)
}

/// Recognizes an archive by its extension. Returns `None` for directories
/// and unrecognized files.
pub fn is_archive(path: &Path) -> Option<ArchiveKind> {
    let ext = path.extension()?.to_str()?;
    ArchiveKind::from_extension(ext)
}

/// `__MACOSX/...` (or a bare `__macosx` segment) is macOS Finder metadata
/// injected into zip archives; it is filtered case-insensitively anywhere in
/// the entry path, not only at its root.
pub fn is_macosx_metadata(entry_path: &str) -> bool {
    entry_path
        .split(['/', '\\'])
        .any(|segment| segment.eq_ignore_ascii_case("__MACOSX"))
}

/// True if `dir_or_archive` directly or recursively contains at least one
/// file with a supported image extension. Directories recurse on disk;
/// archives are probed via their table of contents, never extracted.
pub fn has_supported_image(dir_or_archive: &Path) -> Result<bool> {
    if let Some(kind) = is_archive(dir_or_archive) {
        let entries = reader::open_reader(dir_or_archive, kind)?.list_entries()?;
        return Ok(entries.iter().any(|e| {
            !e.is_directory
                && !is_macosx_metadata(&e.entry_path)
                && entry_has_supported_image_extension(&e.entry_path)
        }));
    }

    if dir_or_archive.is_dir() {
        return has_supported_image_recursive(dir_or_archive);
    }

    Ok(false)
}

fn has_supported_image_recursive(dir: &Path) -> Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if has_supported_image_recursive(&path)? {
                return Ok(true);
            }
        } else if is_archive(&path).is_some() {
            if has_supported_image(&path)? {
                return Ok(true);
            }
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if is_supported_image_extension(ext) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn entry_has_supported_image_extension(entry_path: &str) -> bool {
    Path::new(entry_path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_supported_image_extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_macosx_metadata_anywhere_in_path() {
        assert!(is_macosx_metadata("__MACOSX/._p01.jpg"));
        assert!(is_macosx_metadata("sub/__macosx/x.jpg"));
        assert!(!is_macosx_metadata("__MACOSX_not_really/x.jpg"));
        assert!(!is_macosx_metadata("normal/p01.jpg"));
    }

    #[test]
    fn recognizes_archive_kinds_by_extension() {
        assert_eq!(is_archive(Path::new("book.ZIP")), Some(ArchiveKind::Zip));
        assert_eq!(is_archive(Path::new("book.cbr")), Some(ArchiveKind::Cbr));
        assert_eq!(is_archive(Path::new("folder")), None);
    }

    #[test]
    fn recognizes_supported_image_entry_extensions() {
        assert!(entry_has_supported_image_extension("sub/page.JPG"));
        assert!(!entry_has_supported_image_extension("sub/readme.txt"));
    }
}
