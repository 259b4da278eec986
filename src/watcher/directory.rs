//! Per-directory OS watcher covering a whole tree.
//!
//! Every directory below the root holds its own non-recursive subscription.
//! Directories created later are subscribed when their creation event
//! arrives, and subscriptions for directories that disappear are pruned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::error::WatchError;
use super::watch_set::WatchSet;
use crate::registry::is_json_path;

struct WatchState {
    root: PathBuf,
    /// `None` once stopped.
    watcher: Option<RecommendedWatcher>,
    dirs: WatchSet,
}

impl WatchState {
    fn subscribe(&mut self, dir: &Path) -> Result<(), WatchError> {
        let Some(watcher) = self.watcher.as_mut() else {
            return Ok(());
        };
        if self.dirs.contains(dir) {
            return Ok(());
        }

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.dirs.insert(dir.to_path_buf());
        crate::debug_event!("watcher", "watching", "{}", dir.display());
        Ok(())
    }

    /// Subscribe `dir` and every directory below it. Failures are logged.
    fn subscribe_tree(&mut self, dir: &Path) {
        for entry in WalkDir::new(dir).follow_links(false) {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    if let Err(e) = self.subscribe(entry.path()) {
                        tracing::warn!("[watcher] {e}");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("[watcher] error walking {}: {e}", dir.display()),
            }
        }
    }

    /// Forget subscriptions at or below `dir` whose directory no longer exists.
    fn prune(&mut self, dir: &Path) -> bool {
        let removed = self.dirs.prune_under(dir, |entry| !entry.is_dir());
        if let Some(watcher) = self.watcher.as_mut() {
            for entry in &removed {
                // The OS usually drops the watch on its own
                let _ = watcher.unwatch(entry);
                crate::debug_event!("watcher", "unwatched", "{}", entry.display());
            }
        }
        !removed.is_empty()
    }
}

/// Watches a directory tree and invokes a callback for relevant changes.
///
/// A change is relevant when it touches a `.json` file, a directory, or a
/// path that was a watched directory. Access events are ignored.
pub struct DirectoryWatcher {
    root: PathBuf,
    state: Arc<Mutex<WatchState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DirectoryWatcher {
    /// Subscribe the tree under `root` and start dispatching events.
    ///
    /// Failing to subscribe the root itself is an error; failures below it
    /// are logged. Must be called from within a tokio runtime.
    pub fn start<F>(root: &Path, on_change: F) -> Result<Self, WatchError>
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(WatchError::NoRuntime);
        }

        // Unbounded so the notify thread never blocks while a subscription
        // call holds the state lock.
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(e) => {
                let _ = error_tx.send(e);
            }
        })?;

        let mut state = WatchState {
            root: root.to_path_buf(),
            watcher: Some(watcher),
            dirs: WatchSet::new(),
        };
        state.subscribe(root)?;
        state.subscribe_tree(root);

        crate::log_event!(
            "watcher",
            "started",
            "{} directories under {}",
            state.dirs.len(),
            root.display()
        );

        let state = Arc::new(Mutex::new(state));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(event_loop(
            Arc::clone(&state),
            cancel.clone(),
            event_rx,
            error_rx,
            on_change,
        ));

        Ok(Self {
            root: root.to_path_buf(),
            state,
            cancel,
            task: Some(task),
        })
    }

    /// Number of directories currently subscribed.
    pub fn watched_dirs(&self) -> usize {
        self.state.lock().dirs.len()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Release all OS subscriptions. No callback fires after this returns.
    pub fn stop(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }

        let mut state = self.state.lock();
        state.watcher = None;
        state.dirs.clear();
        crate::debug_event!("watcher", "stopped", "{}", self.root.display());
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn event_loop<F>(
    state: Arc<Mutex<WatchState>>,
    cancel: CancellationToken,
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    mut error_rx: mpsc::UnboundedReceiver<notify::Error>,
    on_change: F,
) where
    F: Fn(&Path) + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                // Subscribing a new subtree walks it and makes watch syscalls
                let shared = Arc::clone(&state);
                let handled = tokio::task::spawn_blocking(move || handle_event(&shared, &event));
                let relevant = match handled.await {
                    Ok(relevant) => relevant,
                    Err(e) => {
                        tracing::warn!("[watcher] event handling failed: {e}");
                        continue;
                    }
                };
                if let Some(path) = relevant {
                    if cancel.is_cancelled() {
                        break;
                    }
                    on_change(&path);
                }
            }
            Some(err) = error_rx.recv() => {
                let err = WatchError::EventError { details: err.to_string() };
                tracing::warn!("[watcher] {err}");
            }
        }
    }
}

/// Update subscriptions for `event` and return the first relevant path.
///
/// Events flagged for rescan (queue overflow) and events without paths
/// resubscribe the whole tree and report the root.
fn handle_event(state: &Mutex<WatchState>, event: &Event) -> Option<PathBuf> {
    let mut state = state.lock();

    let is_access = matches!(event.kind, EventKind::Access(_));
    if event.need_rescan() || (event.paths.is_empty() && !is_access) {
        let root = state.root.clone();
        tracing::warn!("[watcher] events may have been lost ({:?}), rescanning", event.kind);
        state.prune(&root);
        state.subscribe_tree(&root);
        return Some(root);
    }

    if is_access {
        return None;
    }

    let mut relevant = None;

    for path in &event.paths {
        let was_watched = state.dirs.contains(path);
        let is_dir = path.is_dir();

        if is_dir && !was_watched {
            state.subscribe_tree(path);
        }
        let pruned = state.prune(path);

        if is_json_path(path) || is_dir || was_watched || pruned {
            relevant.get_or_insert_with(|| path.clone());
        } else {
            crate::debug_event!("watcher", "ignored", "{:?} {}", event.kind, path.display());
        }
    }

    if state.dirs.is_empty() && state.watcher.is_some() {
        tracing::warn!("[watcher] no directories left under {}", state.root.display());
    }

    relevant
}
