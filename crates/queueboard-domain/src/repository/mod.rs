//! Collaborator traits implemented by the infrastructure layer

use async_trait::async_trait;
use queueboard_types::{AuthData, PushError, PushEvent, QueueError, Vehicle};
use tokio::sync::mpsc::UnboundedReceiver;

/// Source of the ranked vehicle queue for a plant
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Fetch the full ranked list. The list is always replaced wholesale.
    async fn fetch_queue(&self, plant_id: &str) -> Result<Vec<Vehicle>, QueueError>;
}

/// Push-notification transport with per-topic subscriptions
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Subscribe to a topic. Every event on the topic arrives on the
    /// returned receiver until [`PushTransport::unsubscribe`] closes it.
    async fn subscribe(&self, topic: &str) -> Result<UnboundedReceiver<PushEvent>, PushError>;

    /// Drop every handler for the topic and leave it at the server
    async fn unsubscribe(&self, topic: &str) -> Result<(), PushError>;
}

/// Current authenticated session, if any
pub trait SessionProvider: Send + Sync {
    fn auth_data(&self) -> Option<AuthData>;

    fn role(&self) -> Option<String> {
        self.auth_data().and_then(|a| a.role().map(str::to_string))
    }

    fn is_operator(&self) -> bool {
        self.auth_data().is_some_and(|a| a.is_operator())
    }

    /// Driver's own vehicle, highlighted in the queue
    fn vehicle_number(&self) -> Option<String> {
        self.auth_data()
            .and_then(|a| a.vehicle_number().map(str::to_string))
    }

    /// Service code for defaults and topic names; `None` without a session
    fn service_code(&self) -> Option<String> {
        self.auth_data()
            .and_then(|a| a.effective_service_code().map(str::to_string))
    }
}
