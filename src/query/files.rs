//! Selecting and loading the JSON files a query runs over.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use super::error::{QueryError, QueryResult};

/// Characters that make a pattern a glob rather than a literal path.
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// Expand `patterns` into a sorted, deduplicated list of paths under `root`.
///
/// Relative patterns are resolved against `root`. Absolute patterns are
/// accepted only when they stay inside it, and `..` may not climb out of it.
/// Literal paths are kept even when missing so loading can report them;
/// glob patterns only yield existing files.
pub fn resolve_patterns(root: &Path, patterns: &[String]) -> QueryResult<Vec<PathBuf>> {
    let root = normalize(root);
    let mut resolved = BTreeSet::new();

    for pattern in patterns {
        let candidate = normalize(&root.join(pattern));
        if !candidate.starts_with(&root) {
            return Err(QueryError::OutsideRoot(pattern.clone()));
        }

        if !pattern.contains(GLOB_CHARS) {
            resolved.insert(candidate);
            continue;
        }

        // Only the part below the root is interpreted as a glob
        let Ok(rel) = candidate.strip_prefix(&root) else {
            return Err(QueryError::OutsideRoot(pattern.clone()));
        };
        let full = PathBuf::from(glob::Pattern::escape(&root.to_string_lossy())).join(rel);

        let paths = glob::glob(&full.to_string_lossy()).map_err(|e| QueryError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    resolved.insert(path);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("[query] skipping unreadable match for {pattern}: {e}"),
            }
        }
    }

    Ok(resolved.into_iter().collect())
}

/// Read and parse every path, failing on the first bad one.
pub fn load_documents(paths: &[PathBuf]) -> QueryResult<Vec<Value>> {
    paths.iter().map(|path| load_document(path)).collect()
}

fn load_document(path: &Path) -> QueryResult<Value> {
    let metadata = std::fs::metadata(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            QueryError::FileNotFound(path.to_path_buf())
        } else {
            QueryError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    if metadata.is_dir() {
        return Err(QueryError::IsDirectory(path.to_path_buf()));
    }

    let data = std::fs::read(path).map_err(|source| QueryError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&data).map_err(|source| QueryError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the filesystem root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}
