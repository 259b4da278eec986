//! Builds the client-facing manifest from a snapshot.
//!
//! The manifest lists every file relative to the data directory and suggests
//! file patterns a client can pass straight to `run_jq`:
//!
//! 1. `*.json` and `**/*.json`, always
//! 2. `<dir>/*.json` for each subdirectory holding more than one file
//! 3. one example naming up to three concrete files

use std::collections::BTreeMap;
use std::path::{Component, Path};

use super::types::{FileRecord, Manifest, ManifestEntry, SuggestedPattern};

/// How many files the example pattern names at most.
const EXAMPLE_FILE_COUNT: usize = 3;

pub const BASE_PATTERN: &str = "*.json";
pub const RECURSIVE_PATTERN: &str = "**/*.json";

/// Derive a manifest from `files`, relativizing paths against `root`.
pub fn build_manifest(root: &Path, files: &[FileRecord]) -> Manifest {
    let entries: Vec<ManifestEntry> = files
        .iter()
        .map(|file| ManifestEntry {
            path: relative_display(root, &file.path),
            size: file.size,
            modified: file.modified,
        })
        .collect();

    let suggested_patterns = if entries.is_empty() {
        None
    } else {
        Some(suggest_patterns(&entries))
    };

    Manifest {
        total_files: entries.len(),
        files: entries,
        suggested_patterns,
    }
}

fn suggest_patterns(entries: &[ManifestEntry]) -> Vec<SuggestedPattern> {
    let mut patterns = vec![
        SuggestedPattern::new(BASE_PATTERN, "All JSON files in base path"),
        SuggestedPattern::new(RECURSIVE_PATTERN, "All JSON files recursively"),
    ];

    // Files at the root have no directory and never get a pattern of their own
    let mut dir_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        if let Some((dir, _)) = entry.path.rsplit_once('/') {
            *dir_counts.entry(dir).or_default() += 1;
        }
    }

    for (dir, count) in dir_counts {
        if count > 1 {
            let name = dir.rsplit('/').next().unwrap_or(dir);
            patterns.push(SuggestedPattern::new(
                format!("{dir}/*.json"),
                format!("All {count} JSON files in {name}"),
            ));
        }
    }

    let examples: Vec<&str> = entries
        .iter()
        .take(EXAMPLE_FILE_COUNT)
        .map(|entry| entry.path.as_str())
        .collect();
    patterns.push(SuggestedPattern::new(
        examples.join(" "),
        format!("Example: Query {} specific files", examples.len()),
    ));

    patterns
}

/// Path relative to `root` with `/` separators, or the absolute path when
/// `path` is not under `root`.
fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::path::PathBuf;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            modified: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    fn patterns(manifest: &Manifest) -> Vec<(&str, &str)> {
        manifest
            .suggested_patterns
            .as_ref()
            .unwrap()
            .iter()
            .map(|p| (p.pattern.as_str(), p.description.as_str()))
            .collect()
    }

    #[test]
    fn test_empty_snapshot_has_no_patterns() {
        let manifest = build_manifest(Path::new("/data"), &[]);
        assert_eq!(manifest.total_files, 0);
        assert!(manifest.files.is_empty());
        assert!(manifest.suggested_patterns.is_none());

        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json.get("suggested_patterns").is_none());
        assert_eq!(json["total_files"], 0);
    }

    #[test]
    fn test_relative_paths_and_metadata() {
        let files = vec![record("/data/a.json", 10), record("/data/b/c.json", 20)];
        let manifest = build_manifest(Path::new("/data"), &files);

        assert_eq!(manifest.total_files, 2);
        assert_eq!(manifest.files[0].path, "a.json");
        assert_eq!(manifest.files[0].size, 10);
        assert_eq!(manifest.files[1].path, "b/c.json");
        assert_eq!(manifest.files[1].size, 20);
        assert_eq!(manifest.files[1].modified, files[1].modified);
    }

    #[test]
    fn test_path_outside_root_falls_back_to_absolute() {
        let files = vec![record("/elsewhere/x.json", 1)];
        let manifest = build_manifest(Path::new("/data"), &files);
        assert_eq!(manifest.files[0].path, "/elsewhere/x.json");
    }

    #[test]
    fn test_patterns_for_mixed_tree() {
        let files = vec![
            record("/data/file1.json", 1),
            record("/data/file2.json", 1),
            record("/data/segments/s1.json", 1),
            record("/data/segments/s2.json", 1),
            record("/data/segments/s3.json", 1),
            record("/data/solo/only.json", 1),
        ];
        let manifest = build_manifest(Path::new("/data"), &files);

        assert_eq!(
            patterns(&manifest),
            vec![
                ("*.json", "All JSON files in base path"),
                ("**/*.json", "All JSON files recursively"),
                ("segments/*.json", "All 3 JSON files in segments"),
                (
                    "file1.json file2.json segments/s1.json",
                    "Example: Query 3 specific files"
                ),
            ]
        );
    }

    #[test]
    fn test_nested_directory_pattern_names_basename() {
        let files = vec![
            record("/data/reports/2024/q1.json", 1),
            record("/data/reports/2024/q2.json", 1),
        ];
        let manifest = build_manifest(Path::new("/data"), &files);
        let found = patterns(&manifest);

        assert!(found.contains(&("reports/2024/*.json", "All 2 JSON files in 2024")));
    }

    #[test]
    fn test_single_file_example() {
        let files = vec![record("/data/only.json", 5)];
        let manifest = build_manifest(Path::new("/data"), &files);
        let found = patterns(&manifest);

        assert_eq!(found.len(), 3);
        assert_eq!(found[0].0, BASE_PATTERN);
        assert_eq!(found[1].0, RECURSIVE_PATTERN);
        assert_eq!(found[2], ("only.json", "Example: Query 1 specific files"));
    }
}
