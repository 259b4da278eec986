//! Error types for the file registry.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from scanning the data directory.
///
/// Every variant describes a whole-tree failure. Problems with a single entry
/// are logged by the scanner and never surface here.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Cannot resolve path {}: {source}", path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot access data directory {}: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Error scanning files in {}: {reason}", path.display())]
    Scan { path: PathBuf, reason: String },

    #[error("Registry is closed")]
    Closed,
}

pub type RegistryResult<T> = Result<T, RegistryError>;
