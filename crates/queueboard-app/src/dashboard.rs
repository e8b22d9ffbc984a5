//! Dashboard orchestrator
//!
//! Wires plant selection to the fetch coordinator, the live channel and the
//! polling scheduler, and exposes the settings manager to the presentation.

use std::sync::Arc;
use std::time::Duration;

use queueboard_domain::SessionProvider;
use queueboard_types::{Plant, Result, Vehicle};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::fetch::{FetchMode, QueueFetcher, QueueState};
use crate::live_channel::LiveChannel;
use crate::polling::PollingScheduler;
use crate::settings_manager::SettingsManager;

pub struct Dashboard {
    fetcher: QueueFetcher,
    settings: Arc<SettingsManager>,
    session: Arc<dyn SessionProvider>,
    /// `None` when no push transport is configured
    live: Option<LiveChannel>,
    polling: PollingScheduler,
    poll_interval: Duration,
    selected: Mutex<Option<Plant>>,
}

impl Dashboard {
    pub fn new(
        fetcher: QueueFetcher,
        settings: Arc<SettingsManager>,
        session: Arc<dyn SessionProvider>,
        live: Option<LiveChannel>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            settings,
            session,
            live,
            polling: PollingScheduler::new(),
            poll_interval,
            selected: Mutex::new(None),
        }
    }

    /// Select a plant, or deselect with `None`.
    ///
    /// Reselecting the active plant does nothing. Otherwise polling and the
    /// live channel for the old plant stop before anything starts for the
    /// new one.
    pub async fn select_plant(&self, plant: Option<Plant>) {
        let mut selected = self.selected.lock().await;
        let current_id = selected.as_ref().map(|p| p.id.as_str());
        if current_id == plant.as_ref().map(|p| p.id.as_str()) {
            debug!("Plant {:?} already selected", current_id);
            return;
        }

        self.polling.stop();
        if let Some(ref live) = self.live {
            live.unsubscribe().await;
        }
        self.fetcher.set_plant(plant.as_ref().map(|p| p.id.clone()));
        *selected = plant.clone();

        let Some(plant) = plant else {
            info!("Plant deselected");
            return;
        };
        info!("Selected plant {} ({})", plant.id, plant.name);

        if let Some(ref live) = self.live {
            match self.session.service_code() {
                Some(code) => {
                    if let Err(e) = live.switch_to(&plant.id, &code).await {
                        warn!("Live updates unavailable: {}", e);
                    }
                }
                None => info!("No service code in session, live updates disabled"),
            }
        }

        self.fetcher.spawn_fetch(FetchMode::Normal);

        let fetcher = self.fetcher.clone();
        self.polling.start(self.poll_interval, move || {
            fetcher.spawn_fetch(FetchMode::Silent);
        });
    }

    /// Fleet number of the session's own vehicle, if it is a driver session
    pub fn own_vehicle_number(&self) -> Option<String> {
        self.session.vehicle_number()
    }

    pub async fn retry(&self) {
        self.fetcher.retry().await;
    }

    pub async fn refresh(&self) {
        self.fetcher.refresh().await;
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    /// Seed factor settings once real vehicle data is on screen
    pub fn on_vehicles_loaded(&self, vehicles: &[Vehicle]) -> Result<bool> {
        self.settings.initialize_factor_scores(vehicles)
    }

    pub fn state(&self) -> QueueState {
        self.fetcher.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.fetcher.subscribe()
    }

    pub fn fetcher(&self) -> &QueueFetcher {
        &self.fetcher
    }

    pub fn live_channel(&self) -> Option<&LiveChannel> {
        self.live.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_running()
    }

    /// Stop polling, leave the live channel and cancel the request in flight
    pub async fn shutdown(&self) {
        self.polling.stop();
        if let Some(ref live) = self.live {
            live.unsubscribe().await;
        }
        self.fetcher.cancel();
        info!("Dashboard stopped");
    }
}
