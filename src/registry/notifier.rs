//! Change notification seam between the registry and its consumers.

/// Receives a signal after each snapshot swap.
///
/// The registry calls this synchronously from the refresh path, outside any
/// snapshot lock, so implementations may read the registry again.
pub trait ChangeNotifier: Send + Sync {
    fn resources_changed(&self, total_files: usize);
}

impl<F> ChangeNotifier for F
where
    F: Fn(usize) + Send + Sync,
{
    fn resources_changed(&self, total_files: usize) {
        self(total_files)
    }
}
