//! Trailing-edge debouncing for bursts of file change events.
//!
//! Editors and tools often write a file several times in quick succession
//! (save, format, rename-into-place). Each event restarts the quiet period,
//! and the action runs once the directory has been quiet for that long.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Collapses a burst of triggers into a single delayed action.
#[derive(Debug)]
pub struct Debouncer {
    /// How long the source must stay quiet before the action runs.
    quiet_period: Duration,
    /// The timer task for the most recent trigger, if any.
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: Mutex::new(None),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Restart the quiet period and run `action` when it elapses.
    ///
    /// A previously scheduled action that has not started yet is dropped.
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let quiet_period = self.quiet_period;
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            action.await;
        }));
    }

    /// Drop the pending action, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }

    /// Whether an action is waiting for its quiet period or still running.
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
