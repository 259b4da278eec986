//! Query command - run a jq filter over files from the command line.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::query::{JaqEngine, run_query};

/// Run `filter` over `files` and print the result to stdout.
///
/// With a data path, files resolve under it and may not leave it. Without
/// one, files resolve against the current directory and any path is allowed.
pub fn run(files: Vec<String>, filter: String, data_path: Option<PathBuf>) -> anyhow::Result<()> {
    let output = execute(&files, &filter, data_path.as_deref())?;
    println!("{output}");
    Ok(())
}

fn execute(files: &[String], filter: &str, data_path: Option<&Path>) -> anyhow::Result<String> {
    let (root, patterns) = match data_path {
        Some(root) => (root.to_path_buf(), files.to_vec()),
        None => {
            let cwd = std::env::current_dir().context("Cannot determine current directory")?;
            let patterns = files
                .iter()
                .map(|f| cwd.join(f).to_string_lossy().into_owned())
                .collect();
            let fs_root = cwd.ancestors().last().unwrap_or(&cwd).to_path_buf();
            (fs_root, patterns)
        }
    };

    let root = std::path::absolute(&root)
        .with_context(|| format!("Cannot resolve path {}", root.display()))?;

    Ok(run_query(&JaqEngine, filter, &patterns, &root)?)
}
