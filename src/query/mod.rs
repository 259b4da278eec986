//! jq queries over files in the data directory.

mod engine;
mod error;
mod files;

pub use engine::{JaqEngine, QueryEngine};
pub use error::{QueryError, QueryResult};
pub use files::{load_documents, resolve_patterns};

use std::path::Path;

/// Resolve `patterns` under `root`, load the matches and run `filter`.
pub fn run_query(
    engine: &dyn QueryEngine,
    filter: &str,
    patterns: &[String],
    root: &Path,
) -> QueryResult<String> {
    if patterns.is_empty() {
        return Err(QueryError::NoPatterns);
    }

    let paths = resolve_patterns(root, patterns)?;
    if paths.is_empty() {
        return Err(QueryError::NoMatches(patterns.join(" ")));
    }

    crate::debug_event!("query", "running", "{filter} over {} files", paths.len());

    let documents = load_documents(&paths)?;
    engine.execute(filter, documents)
}

/// Split a whitespace-separated pattern list.
pub fn split_patterns(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}
