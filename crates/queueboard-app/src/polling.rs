//! Fixed-interval fallback refresh

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Runs an action periodically while started. The first tick lands one full
/// interval after [`PollingScheduler::start`].
#[derive(Default)]
pub struct PollingScheduler {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace any running timer with a new one
    pub fn start<F>(&self, interval: Duration, action: F)
    where
        F: Fn() + Send + 'static,
    {
        let mut task = self.task();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        debug!("Polling every {:?}", interval);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                action();
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(task) = self.task().take() {
            debug!("Polling stopped");
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
