//! Entry-ref encoding: `archive.zip#entry.jpg`, always `#`, never a platform
//! path separator. Every consumer input is passed through
//! [`fix_legacy_entry_path`] before use.

use once_cell::sync::Lazy;
use regex::Regex;

/// Joins an archive path and an in-archive entry path into the normative
/// `archive#entry` form. Idempotent: passing an already-normalized
/// `archive#entry` string back through a second join is never done by
/// callers, but [`normalize_entry_ref`] itself only ever produces one `#`.
pub fn normalize_entry_ref(archive_path: &str, entry_path: &str) -> String {
    let archive = archive_path.replace('\\', "/");
    let entry = entry_path.replace('\\', "/");
    format!("{archive}#{entry}")
}

/// Splits a normalized entry ref into `(archive_path, entry_path)`. Returns
/// `None` if the path carries no `#` separator (a plain filesystem path).
pub fn parse_entry_ref(path: &str) -> Option<(&str, &str)> {
    path.split_once('#')
}

static LEGACY_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(zip|rar|7z|tar|gz)[\\/]").unwrap()
});

/// Rewrites the legacy `archive.zip\entry.jpg` (or `/`) separator into the
/// normative `archive.zip#entry.jpg` form. A fixed point: running it twice
/// yields the same string as running it once, since the rewritten form no
/// longer matches the legacy pattern.
pub fn fix_legacy_entry_path(path: &str) -> String {
    if path.contains('#') {
        return path.to_string();
    }
    match LEGACY_SEPARATOR.find(path) {
        Some(m) => {
            let ext_end = m.end() - 1; // position of the separator char itself
            let mut fixed = path.to_string();
            fixed.replace_range(ext_end..ext_end + 1, "#");
            fixed.replace('\\', "/")
        }
        None => path.to_string(),
    }
}
