//! Filesystem watching for the data directory.
//!
//! ```text
//! notify callback ──► event channel ──► DirectoryWatcher task
//!                                           │  subscribe new dirs
//!                                           │  prune vanished dirs
//!                                           ▼
//!                                      on_change(path)
//!                                           │
//!                                      Debouncer (quiet period)
//!                                           ▼
//!                                      registry refresh
//! ```

mod debouncer;
mod directory;
mod error;
mod watch_set;

pub use debouncer::Debouncer;
pub use directory::DirectoryWatcher;
pub use error::WatchError;
pub use watch_set::WatchSet;
