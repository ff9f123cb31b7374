//! One [`ArchiveReader`] trait behind three adapters (zip/unrar/sevenz-rust2)
//! so callers in C6/C7 never match on [`super::ArchiveKind`] directly.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CoreError, Result};

use super::{ArchiveFamily, ArchiveKind};

/// One entry in an archive's table of contents.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub entry_path: String,
    pub size: u64,
    pub is_directory: bool,
}

/// Read-only access to an archive's table of contents and entry bytes.
/// Implementations never extract the whole archive to disk; entries are
/// streamed on demand.
pub trait ArchiveReader {
    fn list_entries(&self) -> Result<Vec<ArchiveEntry>>;
    fn read_entry(&self, entry_path: &str) -> Result<Vec<u8>>;
}

/// Opens `path` with the reader appropriate for `kind`.
pub fn open_reader(path: &Path, kind: ArchiveKind) -> Result<Box<dyn ArchiveReader>> {
    match kind.family() {
        ArchiveFamily::Zip => Ok(Box::new(ZipArchiveReader::open(path)?)),
        ArchiveFamily::Rar => Ok(Box::new(RarArchiveReader::open(path)?)),
        ArchiveFamily::SevenZ => Ok(Box::new(SevenZArchiveReader::open(path)?)),
    }
}

/// Resolves `relative_ref` (a plain path or an `archive#entry` ref, per
/// [`super::parse_entry_ref`]) against `root` and returns its bytes. Used by
/// the thumbnail/cache consumers, which only ever see a path relative to a
/// library root plus an optional in-archive entry.
pub fn read_source_bytes(root: &Path, relative_ref: &str) -> Result<Vec<u8>> {
    match super::parse_entry_ref(relative_ref) {
        Some((archive_rel, entry)) => {
            let archive_path = root.join(archive_rel);
            let kind = super::is_archive(&archive_path).ok_or_else(|| {
                CoreError::InvalidArchive(format!("not a recognized archive: {archive_rel}"))
            })?;
            open_reader(&archive_path, kind)?.read_entry(entry)
        }
        None => {
            let full_path = root.join(relative_ref);
            Ok(std::fs::read(full_path)?)
        }
    }
}

struct ZipArchiveReader {
    path: std::path::PathBuf,
}

impl ZipArchiveReader {
    fn open(path: &Path) -> Result<Self> {
        // Eagerly validate the central directory parses; the archive itself
        // is reopened per call since `zip::ZipArchive` borrows its reader.
        let file = File::open(path)?;
        zip::ZipArchive::new(file)
            .map_err(|e| CoreError::InvalidArchive(format!("{}: {e}", path.display())))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        let file = File::open(&self.path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
            entries.push(ArchiveEntry {
                entry_path: entry.name().replace('\\', "/"),
                size: entry.size(),
                is_directory: entry.is_dir(),
            });
        }
        Ok(entries)
    }

    fn read_entry(&self, entry_path: &str) -> Result<Vec<u8>> {
        let file = File::open(&self.path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        let mut entry = archive.by_name(entry_path).map_err(|_| {
            CoreError::NotFound(format!("archive entry not found: {entry_path}"))
        })?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

struct RarArchiveReader {
    path: std::path::PathBuf,
}

impl RarArchiveReader {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl ArchiveReader for RarArchiveReader {
    fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        let archive = unrar::Archive::new(&self.path)
            .open_for_listing()
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        let mut entries = Vec::new();
        for header in archive {
            let header = header.map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
            entries.push(ArchiveEntry {
                entry_path: header.filename.to_string_lossy().replace('\\', "/"),
                size: header.unpacked_size,
                is_directory: header.is_directory(),
            });
        }
        Ok(entries)
    }

    fn read_entry(&self, entry_path: &str) -> Result<Vec<u8>> {
        let mut archive = unrar::Archive::new(&self.path)
            .open_for_processing()
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        while let Some(header) = archive
            .read_header()
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?
        {
            let matches = header
                .entry()
                .filename
                .to_string_lossy()
                .replace('\\', "/")
                == entry_path;
            if matches && header.entry().is_file() {
                let (data, _rest) = header
                    .read()
                    .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
                return Ok(data);
            }
            archive = header
                .skip()
                .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        }
        Err(CoreError::NotFound(format!(
            "archive entry not found: {entry_path}"
        )))
    }
}

struct SevenZArchiveReader {
    path: std::path::PathBuf,
}

impl SevenZArchiveReader {
    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl ArchiveReader for SevenZArchiveReader {
    fn list_entries(&self) -> Result<Vec<ArchiveEntry>> {
        let reader = sevenz_rust2::ArchiveReader::open(&self.path, sevenz_rust2::Password::empty())
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        Ok(reader
            .archive()
            .files
            .iter()
            .map(|entry| ArchiveEntry {
                entry_path: entry.name().replace('\\', "/"),
                size: entry.size(),
                is_directory: entry.is_directory(),
            })
            .collect())
    }

    fn read_entry(&self, entry_path: &str) -> Result<Vec<u8>> {
        let mut reader =
            sevenz_rust2::ArchiveReader::open(&self.path, sevenz_rust2::Password::empty())
                .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        let mut found = None;
        reader
            .for_each_entries(|entry, entry_reader| {
                if entry.name().replace('\\', "/") == entry_path {
                    let mut buf = Vec::new();
                    entry_reader.read_to_end(&mut buf)?;
                    found = Some(buf);
                }
                Ok(true)
            })
            .map_err(|e| CoreError::InvalidArchive(e.to_string()))?;
        found.ok_or_else(|| CoreError::NotFound(format!("archive entry not found: {entry_path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn lists_and_reads_entries_from_a_zip_archive() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("book.zip");
        write_zip(&zip_path, &[("page01.jpg", b"one"), ("page02.jpg", b"two")]);

        let reader = ZipArchiveReader::open(&zip_path).unwrap();
        let mut entries = reader.list_entries().unwrap();
        entries.sort_by(|a, b| a.entry_path.cmp(&b.entry_path));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_path, "page01.jpg");
        assert!(!entries[0].is_directory);

        assert_eq!(reader.read_entry("page02.jpg").unwrap(), b"two");
    }

    #[test]
    fn reading_a_missing_entry_is_not_found() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("book.zip");
        write_zip(&zip_path, &[("page01.jpg", b"one")]);

        let reader = ZipArchiveReader::open(&zip_path).unwrap();
        let err = reader.read_entry("nope.jpg").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn read_source_bytes_resolves_a_plain_relative_path() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"raw").unwrap();
        let bytes = read_source_bytes(dir.path(), "a.png").unwrap();
        assert_eq!(bytes, b"raw");
    }

    #[test]
    fn read_source_bytes_resolves_an_entry_ref_into_an_archive() {
        let dir = tempdir().unwrap();
        write_zip(&dir.path().join("book.zip"), &[("page01.jpg", b"page")]);
        let bytes = read_source_bytes(dir.path(), "book.zip#page01.jpg").unwrap();
        assert_eq!(bytes, b"page");
    }
}
