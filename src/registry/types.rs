//! Snapshot and manifest data types.

use std::fs::Metadata;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discovered JSON file. Identity is the absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl FileRecord {
    pub(crate) fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        // Filesystems without mtime support report the epoch
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();

        Self {
            path,
            size: metadata.len(),
            modified,
        }
    }
}

/// Client-facing view of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub total_files: usize,
    pub files: Vec<ManifestEntry>,
    /// Present only when at least one file exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_patterns: Option<Vec<SuggestedPattern>>,
}

/// A file path relative to the data directory, with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// A query target suggestion for `run_jq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPattern {
    pub pattern: String,
    pub description: String,
}

impl SuggestedPattern {
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }
}
