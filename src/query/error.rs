//! Error types for query execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from resolving, loading or querying JSON files.
///
/// The messages are shown verbatim to MCP clients and CLI users.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No file patterns provided")]
    NoPatterns,

    #[error("No files found matching the provided patterns: {0}")]
    NoMatches(String),

    #[error("Access denied: path {0} is outside data directory")]
    OutsideRoot(String),

    #[error("Invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Path is a directory, not a file: {}", .0.display())]
    IsDirectory(PathBuf),

    #[error("File {} is not readable: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File {} does not contain valid JSON: {source}", path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid jq filter: {0}")]
    Parse(String),

    #[error("Failed to compile jq filter: {0}")]
    Compile(String),

    #[error("jq execution error: {0}")]
    Runtime(String),

    #[error("Error formatting results: {0}")]
    Format(#[from] serde_json::Error),
}

pub type QueryResult<T> = Result<T, QueryError>;
