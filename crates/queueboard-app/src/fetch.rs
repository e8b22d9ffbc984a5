//! Queue fetch coordinator
//!
//! Every fetch runs under a [`FetchToken`]. Starting a fetch cancels the
//! token of the one still in flight, and a result is only applied while its
//! token is still the current one. A late response from a superseded request
//! is therefore dropped no matter when it arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use queueboard_domain::QueueSource;
use queueboard_types::{QueueError, Vehicle};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Cancellation handle for one outstanding request
#[derive(Debug, Clone)]
pub struct FetchToken {
    generation: u64,
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
    /// Clears the loading flag when this fetch settles
    owns_loading: bool,
}

impl FetchToken {
    fn new(generation: u64, owns_loading: bool) -> Self {
        Self {
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            owns_loading,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`FetchToken::cancel`] has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Whether a fetch drives the loading indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// User-visible: sets `loading`, clears the previous error
    Normal,
    /// Background refresh from polling or a push notification
    Silent,
}

/// Snapshot of the displayed queue
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueState {
    pub plant_id: Option<String>,
    pub vehicles: Vec<Vehicle>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

impl QueueState {
    /// True while the last successful fetch is younger than `window`
    pub fn is_live(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match (self.last_update, chrono::Duration::from_std(window)) {
            (Some(last), Ok(window)) => now.signed_duration_since(last) < window,
            _ => false,
        }
    }
}

#[derive(Default)]
struct Control {
    plant_id: Option<String>,
    current: Option<FetchToken>,
    next_generation: u64,
}

struct Inner {
    source: Arc<dyn QueueSource>,
    state: watch::Sender<QueueState>,
    control: Mutex<Control>,
    live_window: Duration,
}

/// Owns the displayed queue and every request that may update it
#[derive(Clone)]
pub struct QueueFetcher {
    inner: Arc<Inner>,
}

impl QueueFetcher {
    pub fn new(source: Arc<dyn QueueSource>, live_window: Duration) -> Self {
        let (state, _) = watch::channel(QueueState::default());
        Self {
            inner: Arc::new(Inner {
                source,
                state,
                control: Mutex::new(Control::default()),
                live_window,
            }),
        }
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.inner
            .control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> QueueState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.inner.state.subscribe()
    }

    pub fn plant_id(&self) -> Option<String> {
        self.control().plant_id.clone()
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.inner.state.borrow().is_live(now, self.inner.live_window)
    }

    /// Cancel the in-flight request, if any
    pub fn cancel(&self) {
        let mut control = self.control();
        Self::cancel_current(&mut control, &self.inner.state);
    }

    fn cancel_current(control: &mut Control, state: &watch::Sender<QueueState>) {
        if let Some(token) = control.current.take() {
            debug!("Cancelling fetch #{}", token.generation);
            token.cancel();
            if token.owns_loading {
                state.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
            }
        }
    }

    /// Bind the plant that `retry`/`refresh` fetch. Cancels any request in
    /// flight. Switching to a different plant clears the displayed queue.
    pub fn set_plant(&self, plant_id: Option<String>) {
        let mut control = self.control();
        Self::cancel_current(&mut control, &self.inner.state);
        if control.plant_id == plant_id {
            return;
        }
        control.plant_id = plant_id.clone();
        self.inner.state.send_replace(QueueState {
            plant_id,
            ..Default::default()
        });
    }

    /// Cancel the request in flight and mint the token for a new one
    fn begin(&self, mode: FetchMode) -> FetchToken {
        let mut control = self.control();
        let previous = control.current.take();
        let inherits_loading = previous.as_ref().is_some_and(|t| t.owns_loading);
        if let Some(previous) = previous {
            debug!(
                "Fetch #{} superseded by #{}",
                previous.generation, control.next_generation
            );
            previous.cancel();
        }

        let token = FetchToken::new(
            control.next_generation,
            mode == FetchMode::Normal || inherits_loading,
        );
        control.next_generation += 1;
        control.current = Some(token.clone());

        if mode == FetchMode::Normal {
            self.inner.state.send_modify(|s| {
                s.loading = true;
                s.error = None;
            });
        }
        token
    }

    /// Apply a settled result if its token is still current
    fn finish(&self, token: &FetchToken, result: Result<Vec<Vehicle>, QueueError>) {
        let mut control = self.control();
        let is_current = control
            .current
            .as_ref()
            .is_some_and(|current| current.generation == token.generation);
        if !is_current || token.is_cancelled() {
            debug!("Discarding result of superseded fetch #{}", token.generation);
            return;
        }
        control.current = None;

        match result {
            Ok(vehicles) => {
                debug!("Fetch #{} loaded {} vehicles", token.generation, vehicles.len());
                self.inner.state.send_modify(|s| {
                    s.vehicles = vehicles;
                    s.last_update = Some(Utc::now());
                    s.error = None;
                    if token.owns_loading {
                        s.loading = false;
                    }
                });
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                warn!("Failed to fetch vehicle queue: {}", e);
                self.inner.state.send_modify(|s| {
                    s.error = Some(e.to_string());
                    if token.owns_loading {
                        s.loading = false;
                    }
                });
            }
        }
    }

    /// Fetch the queue for `plant_id`; does nothing without a plant
    pub async fn fetch(&self, plant_id: Option<&str>, mode: FetchMode) {
        let Some(plant_id) = plant_id else {
            return;
        };

        let token = self.begin(mode);
        let result = tokio::select! {
            _ = token.cancelled() => Err(QueueError::Cancelled),
            result = self.inner.source.fetch_queue(plant_id) => result,
        };
        self.finish(&token, result);
    }

    /// User-triggered fetch of the bound plant
    pub async fn retry(&self) {
        let plant_id = self.plant_id();
        self.fetch(plant_id.as_deref(), FetchMode::Normal).await;
    }

    /// Background fetch of the bound plant
    pub async fn refresh(&self) {
        let plant_id = self.plant_id();
        self.fetch(plant_id.as_deref(), FetchMode::Silent).await;
    }

    /// Run a fetch of the bound plant on its own task
    pub fn spawn_fetch(&self, mode: FetchMode) -> JoinHandle<()> {
        let fetcher = self.clone();
        tokio::spawn(async move {
            let plant_id = fetcher.plant_id();
            fetcher.fetch(plant_id.as_deref(), mode).await;
        })
    }
}
