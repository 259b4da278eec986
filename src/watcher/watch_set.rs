//! The set of directories currently subscribed with the OS watcher.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Tracks which directories hold a non-recursive subscription.
///
/// Subscriptions are per directory, so new subdirectories must be added as
/// they appear and vanished ones pruned so they can be re-added later.
#[derive(Debug, Default)]
pub struct WatchSet {
    dirs: HashSet<PathBuf>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription. Returns `false` if it was already present.
    pub fn insert(&mut self, dir: PathBuf) -> bool {
        self.dirs.insert(dir)
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Remove every entry at or below `dir` for which `gone` returns true,
    /// returning the removed entries.
    pub fn prune_under(&mut self, dir: &Path, gone: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
        let removed: Vec<PathBuf> = self
            .dirs
            .iter()
            .filter(|entry| entry.starts_with(dir) && gone(entry))
            .cloned()
            .collect();

        for entry in &removed {
            self.dirs.remove(entry);
        }

        removed
    }

    pub fn clear(&mut self) {
        self.dirs.clear();
    }
}
