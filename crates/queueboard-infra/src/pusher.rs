//! Pusher (protocol 7) websocket client
//!
//! One connection is shared by every topic. Topics registered while the
//! socket is down are subscribed as soon as the server confirms the next
//! connection, and all topics are resubscribed after a reconnect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use queueboard_domain::PushTransport;
use queueboard_types::{PushError, PushEvent};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: u8 = 7;
const CLIENT_NAME: &str = "queueboard";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Application key and cluster of the Pusher app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PusherConfig {
    pub key: String,
    pub cluster: String,
    /// Overrides `ws-<cluster>.pusher.com`, e.g. for a self-hosted relay
    pub host: Option<String>,
}

impl PusherConfig {
    pub fn new(key: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cluster: cluster.into(),
            host: None,
        }
    }

    pub fn endpoint(&self) -> String {
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| format!("ws-{}.pusher.com:443", self.cluster));
        format!(
            "wss://{}/app/{}?protocol={}&client={}&version={}&flash=false",
            host,
            self.key,
            PROTOCOL_VERSION,
            CLIENT_NAME,
            env!("CARGO_PKG_VERSION")
        )
    }
}

/// Frames understood by the client
#[derive(Debug, PartialEq)]
enum Inbound {
    Established,
    Ping,
    Event(PushEvent),
    ServerError(String),
    Ignored,
}

fn parse_frame(text: &str) -> Result<Inbound, PushError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|e| PushError::Protocol(e.to_string()))?;
    let event = frame
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| PushError::Protocol("frame without event name".to_string()))?;

    // Pusher string-encodes `data` on most frames
    let data = match frame.get("data") {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    };

    Ok(match event {
        "pusher:connection_established" => Inbound::Established,
        "pusher:ping" => Inbound::Ping,
        "pusher:error" => Inbound::ServerError(
            data.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        ),
        e if e.starts_with("pusher:") || e.starts_with("pusher_internal:") => Inbound::Ignored,
        e => match frame.get("channel").and_then(Value::as_str) {
            Some(channel) => Inbound::Event(PushEvent {
                channel: channel.to_string(),
                event: e.to_string(),
                data,
            }),
            None => Inbound::Ignored,
        },
    })
}

fn subscribe_frame(topic: &str) -> String {
    json!({"event": "pusher:subscribe", "data": {"channel": topic}}).to_string()
}

fn unsubscribe_frame(topic: &str) -> String {
    json!({"event": "pusher:unsubscribe", "data": {"channel": topic}}).to_string()
}

fn pong_frame() -> String {
    json!({"event": "pusher:pong", "data": {}}).to_string()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared with the connection task.
///
/// Lock order: `channels` before `outbound`.
struct Shared {
    config: PusherConfig,
    channels: Mutex<HashMap<String, UnboundedSender<PushEvent>>>,
    /// Set once the server has confirmed the connection
    outbound: Mutex<Option<UnboundedSender<String>>>,
}

impl Shared {
    fn attach(&self, tx: UnboundedSender<String>) {
        let channels = lock(&self.channels);
        let mut outbound = lock(&self.outbound);
        for topic in channels.keys() {
            let _ = tx.send(subscribe_frame(topic));
        }
        *outbound = Some(tx);
        info!("Push connection established, {} topic(s) subscribed", channels.len());
    }

    /// Drop the outbound sender; returns whether the connection had been
    /// confirmed by the server
    fn detach(&self) -> bool {
        lock(&self.outbound).take().is_some()
    }

    fn send(&self, frame: String) {
        if let Some(tx) = lock(&self.outbound).as_ref() {
            let _ = tx.send(frame);
        }
    }

    fn dispatch(&self, event: PushEvent) {
        let mut channels = lock(&self.channels);
        let closed = match channels.get(&event.channel) {
            Some(tx) => tx.send(event.clone()).is_err(),
            None => {
                debug!("Dropping event for unknown channel {}", event.channel);
                false
            }
        };
        if closed {
            channels.remove(&event.channel);
        }
    }

    fn handle_text(&self, text: &str, tx: &UnboundedSender<String>) {
        match parse_frame(text) {
            Ok(Inbound::Established) => self.attach(tx.clone()),
            Ok(Inbound::Ping) => {
                let _ = tx.send(pong_frame());
            }
            Ok(Inbound::Event(event)) => self.dispatch(event),
            Ok(Inbound::ServerError(message)) => warn!("Push server error: {}", message),
            Ok(Inbound::Ignored) => {}
            Err(e) => warn!("{}", e),
        }
    }
}

async fn run_connection(shared: &Shared) -> Result<(), PushError> {
    let (ws, _) = connect_async(shared.config.endpoint())
        .await
        .map_err(|e| PushError::Connection(e.to_string()))?;
    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    loop {
        tokio::select! {
            Some(frame) = rx.recv() => {
                write
                    .send(Message::Text(frame))
                    .await
                    .map_err(|e| PushError::Connection(e.to_string()))?;
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => shared.handle_text(&text, &tx),
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(PushError::Connection(e.to_string())),
            }
        }
    }
}

/// Delay before the next connection attempt. Doubles after each failed
/// attempt and starts over once a connection has worked.
fn next_delay(previous: Option<Duration>, reset: bool) -> Duration {
    match previous {
        Some(previous) if !reset => (previous * 2).min(MAX_BACKOFF),
        _ => INITIAL_BACKOFF,
    }
}

async fn connection_loop(shared: Arc<Shared>) {
    let mut delay = None;
    loop {
        let closed_cleanly = match run_connection(&shared).await {
            Ok(()) => {
                info!("Push connection closed by server");
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        };
        // A connection the server confirmed counts as working even if it
        // later dropped with an error
        let was_established = shared.detach();

        let backoff = next_delay(delay, closed_cleanly || was_established);
        debug!("Reconnecting push channel in {:?}", backoff);
        tokio::time::sleep(backoff).await;
        delay = Some(backoff);
    }
}

/// Push transport over a single Pusher websocket
pub struct PusherClient {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PusherClient {
    pub fn new(config: PusherConfig) -> Result<Self, PushError> {
        if config.key.trim().is_empty() {
            return Err(PushError::NotConfigured("missing Pusher app key".to_string()));
        }
        if config.cluster.trim().is_empty() && config.host.is_none() {
            return Err(PushError::NotConfigured("missing Pusher cluster".to_string()));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                channels: Mutex::new(HashMap::new()),
                outbound: Mutex::new(None),
            }),
            task: Mutex::new(None),
        })
    }

    /// Start the connection task. Calling it again while running is a no-op.
    pub fn connect(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        info!("Connecting push channel to {}", self.shared.config.endpoint());
        *task = Some(tokio::spawn(connection_loop(self.shared.clone())));
    }

    /// Stop the connection task. Topic registrations are kept for the next
    /// [`PusherClient::connect`].
    pub fn disconnect(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        self.shared.detach();
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.outbound).is_some()
    }
}

impl Drop for PusherClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[async_trait]
impl PushTransport for PusherClient {
    async fn subscribe(&self, topic: &str) -> Result<UnboundedReceiver<PushEvent>, PushError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = lock(&self.shared.channels);
        channels.insert(topic.to_string(), tx);
        self.shared.send(subscribe_frame(topic));
        debug!("Subscribed to {}", topic);
        Ok(rx)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), PushError> {
        let mut channels = lock(&self.shared.channels);
        if channels.remove(topic).is_some() {
            self.shared.send(unsubscribe_frame(topic));
            debug!("Unsubscribed from {}", topic);
        }
        Ok(())
    }
}
