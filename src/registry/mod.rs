//! Live registry of the JSON files under a data directory.
//!
//! The registry holds a snapshot of every `.json` file below its root. The
//! snapshot is rebuilt wholesale by a rescan and swapped in atomically, so
//! readers always see one complete scan. With watching enabled, filesystem
//! events schedule a debounced rescan and a [`ChangeNotifier`] is told after
//! each swap.

mod error;
mod manifest;
mod notifier;
mod scanner;
mod types;

pub use error::{RegistryError, RegistryResult};
pub use manifest::{BASE_PATTERN, RECURSIVE_PATTERN, build_manifest};
pub use notifier::ChangeNotifier;
pub use scanner::{is_json_path, scan};
pub use types::{FileRecord, Manifest, ManifestEntry, SuggestedPattern};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::watcher::{Debouncer, DirectoryWatcher, WatchError};

/// Idle time after the last qualifying event before a rescan fires.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

struct RegistryInner {
    root: PathBuf,
    snapshot: RwLock<Vec<FileRecord>>,
    /// Serializes scans so swaps happen in scan order.
    scan_lock: Mutex<()>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    debouncer: Debouncer,
    watcher: Mutex<Option<DirectoryWatcher>>,
    rescans: AtomicU64,
    closed: AtomicBool,
}

impl RegistryInner {
    fn rescan(&self) -> RegistryResult<usize> {
        let _scan = self.scan_lock.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::Closed);
        }

        let files = scan(&self.root)?;
        let total = files.len();

        // Re-check: close() may have run while the scan was in progress
        if self.closed.load(Ordering::Acquire) {
            return Err(RegistryError::Closed);
        }
        *self.snapshot.write() = files;
        self.rescans.fetch_add(1, Ordering::AcqRel);

        crate::log_event!("registry", "rescanned", "{total} files");

        if let Some(notifier) = &self.notifier {
            if !self.closed.load(Ordering::Acquire) {
                notifier.resources_changed(total);
            }
        }

        Ok(total)
    }

    /// Restart the quiet period; the rescan runs on the blocking pool.
    fn schedule_rescan(self: &Arc<Self>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let weak = Arc::downgrade(self);
        self.debouncer.schedule(async move {
            let Some(inner) = weak.upgrade() else { return };
            if inner.closed.load(Ordering::Acquire) {
                return;
            }
            let result = tokio::task::spawn_blocking(move || inner.rescan()).await;
            match result {
                Ok(Ok(_)) | Ok(Err(RegistryError::Closed)) => {}
                Ok(Err(e)) => tracing::error!("[registry] rescan failed, keeping last snapshot: {e}"),
                Err(e) => tracing::error!("[registry] rescan task failed: {e}"),
            }
        });
    }

    /// Blocks until an in-flight rescan, including its notification, has
    /// finished. A notifier must therefore not call `close`.
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(mut watcher) = self.watcher.lock().take() {
            watcher.stop();
        }
        self.debouncer.cancel();

        // A rescan past its closed check holds this until it has notified
        drop(self.scan_lock.lock());

        crate::debug_event!("registry", "closed", "{}", self.root.display());
    }
}

/// Thread-safe registry of JSON files, shared behind an `Arc`.
///
/// Dropping the registry closes it.
pub struct FileRegistry {
    inner: Arc<RegistryInner>,
}

impl FileRegistry {
    /// Build a registry for `root` and run the initial scan.
    pub fn new(root: impl AsRef<Path>) -> RegistryResult<Self> {
        Self::builder(root).build()
    }

    pub fn builder(root: impl AsRef<Path>) -> FileRegistryBuilder {
        FileRegistryBuilder::new(root.as_ref().to_path_buf())
    }

    /// Absolute root directory.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Copy of the current snapshot, sorted by path.
    pub fn get_files(&self) -> Vec<FileRecord> {
        self.inner.snapshot.read().clone()
    }

    /// Client-facing view of the current snapshot.
    pub fn get_manifest(&self) -> Manifest {
        let snapshot = self.inner.snapshot.read();
        build_manifest(&self.inner.root, &snapshot)
    }

    /// Rescan now and notify, bypassing the debounce.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn refresh(&self) -> RegistryResult<usize> {
        self.inner.rescan()
    }

    /// Completed rescans since construction. The initial scan is not counted.
    pub fn rescan_count(&self) -> u64 {
        self.inner.rescans.load(Ordering::Acquire)
    }

    pub fn is_watching(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .as_ref()
            .is_some_and(DirectoryWatcher::is_running)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Subscribe to filesystem events under the root.
    ///
    /// Calling this while already watching is a no-op. Must be called from
    /// within a tokio runtime.
    pub fn start_watching(&self) -> Result<(), WatchError> {
        if self.is_closed() {
            return Err(WatchError::Closed);
        }

        let mut slot = self.inner.watcher.lock();
        // close() sets the flag before it takes the slot
        if self.is_closed() {
            return Err(WatchError::Closed);
        }
        if slot.is_some() {
            return Ok(());
        }

        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let watcher = DirectoryWatcher::start(&self.inner.root, move |path| {
            if let Some(inner) = weak.upgrade() {
                crate::debug_event!("registry", "change", "{}", path.display());
                inner.schedule_rescan();
            }
        })?;

        *slot = Some(watcher);
        crate::debug_event!(
            "registry",
            "watching",
            "quiet period {}ms",
            self.inner.debouncer.quiet_period().as_millis()
        );
        Ok(())
    }

    /// Stop watching and cancel any pending rescan. Idempotent.
    ///
    /// Returns only after a rescan already in progress has finished, so no
    /// notification is delivered once this returns.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for FileRegistry {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry")
            .field("root", &self.inner.root)
            .field("files", &self.inner.snapshot.read().len())
            .field("rescans", &self.rescan_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for [`FileRegistry`].
pub struct FileRegistryBuilder {
    root: PathBuf,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    quiet_period: Duration,
}

impl FileRegistryBuilder {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            notifier: None,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }

    /// Sink told about every completed rescan.
    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Resolve the root and run the initial scan.
    pub fn build(self) -> RegistryResult<FileRegistry> {
        let root = std::path::absolute(&self.root).map_err(|source| {
            RegistryError::PathResolution {
                path: self.root.clone(),
                source,
            }
        })?;

        let files = scan(&root)?;
        crate::log_event!("registry", "loaded", "{} files from {}", files.len(), root.display());

        Ok(FileRegistry {
            inner: Arc::new(RegistryInner {
                root,
                snapshot: RwLock::new(files),
                scan_lock: Mutex::new(()),
                notifier: self.notifier,
                debouncer: Debouncer::new(self.quiet_period),
                watcher: Mutex::new(None),
                rescans: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn ChangeNotifier>) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let notifier: Arc<dyn ChangeNotifier> = Arc::new(move |_total: usize| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        (count, notifier)
    }

    #[test]
    fn test_new_scans_and_resolves_root() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.json"), "{}").unwrap();

        let registry = FileRegistry::new(temp.path()).unwrap();
        assert!(registry.root().is_absolute());
        assert_eq!(registry.get_files().len(), 1);
        assert_eq!(registry.rescan_count(), 0);
        assert!(!registry.is_watching());
    }

    #[test]
    fn test_new_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let err = FileRegistry::new(temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::RootUnavailable { .. }));
    }

    #[test]
    fn test_refresh_swaps_and_notifies() {
        let temp = TempDir::new().unwrap();
        let (count, notifier) = counter();
        let registry = FileRegistry::builder(temp.path())
            .notifier(notifier)
            .build()
            .unwrap();
        assert!(registry.get_files().is_empty());

        fs::write(temp.path().join("new.json"), "[]").unwrap();
        assert_eq!(registry.refresh().unwrap(), 1);

        assert_eq!(registry.get_files().len(), 1);
        assert_eq!(registry.rescan_count(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_refresh_keeps_snapshot() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("data");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.json"), "{}").unwrap();

        let (count, notifier) = counter();
        let registry = FileRegistry::builder(&root).notifier(notifier).build().unwrap();

        fs::remove_dir_all(&root).unwrap();
        assert!(registry.refresh().is_err());

        assert_eq!(registry.get_files().len(), 1);
        assert_eq!(registry.rescan_count(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_refresh() {
        let temp = TempDir::new().unwrap();
        let (count, notifier) = counter();
        let registry = FileRegistry::builder(temp.path())
            .notifier(notifier)
            .build()
            .unwrap();

        registry.close();
        registry.close();
        assert!(registry.is_closed());
        assert!(matches!(registry.refresh(), Err(RegistryError::Closed)));
        assert!(matches!(registry.start_watching(), Err(WatchError::Closed)));
        assert!(!registry.is_watching());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_waits_for_in_flight_notification() {
        use std::sync::mpsc;

        let temp = TempDir::new().unwrap();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let notifier: Arc<dyn ChangeNotifier> = Arc::new(move |_total: usize| {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().recv();
        });

        let registry = Arc::new(
            FileRegistry::builder(temp.path())
                .notifier(notifier)
                .build()
                .unwrap(),
        );

        let scanning = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.refresh())
        };
        entered_rx.recv().unwrap();

        let close_returned = Arc::new(AtomicBool::new(false));
        let closing = {
            let registry = Arc::clone(&registry);
            let close_returned = Arc::clone(&close_returned);
            std::thread::spawn(move || {
                registry.close();
                close_returned.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(100));
        assert!(!close_returned.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        closing.join().unwrap();
        assert!(close_returned.load(Ordering::SeqCst));
        assert_eq!(scanning.join().unwrap().unwrap(), 0);
        assert!(matches!(registry.refresh(), Err(RegistryError::Closed)));
    }

    #[test]
    fn test_manifest_matches_snapshot() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("a.json"), "0123456789").unwrap();
        fs::write(temp.path().join("b/c.json"), "01234567890123456789").unwrap();

        let registry = FileRegistry::new(temp.path()).unwrap();
        let manifest = registry.get_manifest();

        assert_eq!(manifest.total_files, registry.get_files().len());
        let paths: Vec<_> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.json", "b/c.json"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_watching_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::new(temp.path()).unwrap();

        registry.start_watching().unwrap();
        registry.start_watching().unwrap();
        assert!(registry.is_watching());

        registry.close();
        assert!(!registry.is_watching());
    }

    #[test]
    fn test_start_watching_outside_runtime() {
        let temp = TempDir::new().unwrap();
        let registry = FileRegistry::new(temp.path()).unwrap();
        assert!(matches!(registry.start_watching(), Err(WatchError::NoRuntime)));
        assert!(!registry.is_watching());
    }
}
