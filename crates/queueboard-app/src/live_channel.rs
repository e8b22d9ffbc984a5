//! Live ranking-update channel
//!
//! Owns the subscription to `vehicle-ranking-<plantId>-<serviceCode>`. Every
//! `vehicle-ranking-updated` event on it pokes the debouncer; the payload is
//! never read. Switching topics fully tears down the old subscription before
//! the new one is requested.

use std::sync::{Arc, Mutex, MutexGuard};

use queueboard_domain::PushTransport;
use queueboard_types::{PushError, PushEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;

pub const RANKING_EVENT: &str = "vehicle-ranking-updated";

pub fn ranking_topic(plant_id: &str, service_code: &str) -> String {
    format!("vehicle-ranking-{}-{}", plant_id, service_code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unsubscribed,
    Subscribing,
    Subscribed,
}

#[derive(Debug)]
struct Status {
    state: ChannelState,
    topic: Option<String>,
}

/// Active subscription: the topic and the task draining its events
#[derive(Default)]
struct Active {
    topic: Option<String>,
    pump: Option<JoinHandle<()>>,
}

pub struct LiveChannel {
    transport: Arc<dyn PushTransport>,
    debouncer: Arc<Debouncer>,
    status: Mutex<Status>,
    /// Serializes subscription changes across their awaits
    active: tokio::sync::Mutex<Active>,
}

impl LiveChannel {
    pub fn new(transport: Arc<dyn PushTransport>, debouncer: Debouncer) -> Self {
        Self {
            transport,
            debouncer: Arc::new(debouncer),
            status: Mutex::new(Status {
                state: ChannelState::Unsubscribed,
                topic: None,
            }),
            active: tokio::sync::Mutex::new(Active::default()),
        }
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, state: ChannelState, topic: Option<String>) {
        let mut status = self.status();
        status.state = state;
        status.topic = topic;
    }

    pub fn state(&self) -> ChannelState {
        self.status().state
    }

    /// Topic currently subscribed or being subscribed
    pub fn topic(&self) -> Option<String> {
        self.status().topic.clone()
    }

    /// Move the subscription to the topic for this plant and service code.
    /// Already being subscribed to that topic is a no-op.
    pub async fn switch_to(&self, plant_id: &str, service_code: &str) -> Result<(), PushError> {
        let topic = ranking_topic(plant_id, service_code);
        let mut active = self.active.lock().await;
        if active.topic.as_deref() == Some(topic.as_str()) {
            debug!("Already subscribed to {}", topic);
            return Ok(());
        }

        self.teardown(&mut active).await;

        self.set_status(ChannelState::Subscribing, Some(topic.clone()));
        match self.transport.subscribe(&topic).await {
            Ok(events) => {
                let pump = tokio::spawn(pump_events(events, self.debouncer.clone()));
                active.topic = Some(topic.clone());
                active.pump = Some(pump);
                self.set_status(ChannelState::Subscribed, Some(topic.clone()));
                info!("Subscribed to {}", topic);
                Ok(())
            }
            Err(e) => {
                self.set_status(ChannelState::Unsubscribed, None);
                Err(e)
            }
        }
    }

    /// Tear down the current subscription, if any
    pub async fn unsubscribe(&self) {
        let mut active = self.active.lock().await;
        self.teardown(&mut active).await;
    }

    async fn teardown(&self, active: &mut Active) {
        if let Some(pump) = active.pump.take() {
            pump.abort();
        }
        self.debouncer.cancel();

        if let Some(topic) = active.topic.take() {
            if let Err(e) = self.transport.unsubscribe(&topic).await {
                warn!("Failed to unsubscribe from {}: {}", topic, e);
            }
            info!("Unsubscribed from {}", topic);
        }
        self.set_status(ChannelState::Unsubscribed, None);
    }
}

async fn pump_events(mut events: UnboundedReceiver<PushEvent>, debouncer: Arc<Debouncer>) {
    while let Some(event) = events.recv().await {
        if event.event == RANKING_EVENT {
            debug!("Ranking update on {}", event.channel);
            debouncer.call();
        }
    }
    debug!("Push event stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_topic() {
        assert_eq!(ranking_topic("7", "ICPL"), "vehicle-ranking-7-ICPL");
    }
}
