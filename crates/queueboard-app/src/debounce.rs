//! Trailing-edge debouncer

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

type Action = Arc<dyn Fn() + Send + Sync>;

/// Runs its action once the calls stop for a full window.
///
/// Holds at most one pending timer; each [`Debouncer::call`] aborts it and
/// arms a fresh one.
pub struct Debouncer {
    window: Duration,
    action: Action,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new<F>(window: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            window,
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restart the quiet window. Must be called inside a tokio runtime.
    pub fn call(&self) {
        let mut pending = self.pending();
        if let Some(timer) = pending.take() {
            debug!("Debounce window restarted");
            timer.abort();
        }

        let action = self.action.clone();
        let window = self.window;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action();
        }));
    }

    /// Drop the pending call without running it
    pub fn cancel(&self) {
        if let Some(timer) = self.pending().take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending().as_ref().is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
