//! One-shot directory walk producing a snapshot of JSON files.

use std::cmp::Ordering;
use std::path::Path;

use walkdir::WalkDir;

use super::error::{RegistryError, RegistryResult};
use super::types::FileRecord;

/// Whether `path` ends in `.json`, ignoring case.
pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Byte-wise lexical order of the path strings.
pub(crate) fn path_order(a: &FileRecord, b: &FileRecord) -> Ordering {
    a.path.as_os_str().cmp(b.path.as_os_str())
}

/// Walk `root` recursively and collect every `.json` file.
///
/// The root must be readable; anything below it that cannot be read is
/// logged and skipped. Symlinks are followed for metadata only, so a link to
/// a file is recorded with the target's size and a dangling link is skipped.
pub fn scan(root: &Path) -> RegistryResult<Vec<FileRecord>> {
    let root_meta = std::fs::metadata(root).map_err(|source| RegistryError::RootUnavailable {
        path: root.to_path_buf(),
        source,
    })?;
    if !root_meta.is_dir() {
        return Err(RegistryError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(RegistryError::Scan {
                    path: root.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!("[scanner] error accessing {path}: {e}");
                continue;
            }
        };

        if entry.file_type().is_dir() || !is_json_path(entry.path()) {
            continue;
        }

        let metadata = match std::fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("[scanner] error accessing {}: {e}", entry.path().display());
                continue;
            }
        };

        // Symlink to a directory named *.json
        if metadata.is_dir() {
            continue;
        }

        files.push(FileRecord::from_metadata(entry.into_path(), &metadata));
    }

    files.sort_by(path_order);
    files.dedup_by(|a, b| a.path == b.path);

    crate::debug_event!("scanner", "scanned", "{} JSON files in {}", files.len(), root.display());

    Ok(files)
}
