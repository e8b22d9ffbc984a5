//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use queueboard_domain::{PushTransport, QueueSource, SessionProvider};
use queueboard_types::{AuthData, PushError, PushEvent, QueueError, UserInfo, Vehicle};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

pub fn vehicle(id: i64, rank: u32) -> Vehicle {
    Vehicle {
        id,
        rank,
        item: format!("{}", 9000 + id),
        vehicle_number: Some(format!("{}", 9000 + id)),
        ..Default::default()
    }
}

/// Session with a fixed service code, or no session at all
#[derive(Default)]
pub struct FixedSession {
    code: Option<String>,
    role: Option<String>,
    vehicle_number: Option<String>,
}

impl FixedSession {
    pub fn with_code(code: &str) -> Arc<Self> {
        Arc::new(Self {
            code: Some(code.to_string()),
            ..Default::default()
        })
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Logged-in user with a role and, for drivers, their own vehicle
    pub fn user(code: &str, role: &str, vehicle_number: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            code: Some(code.to_string()),
            role: Some(role.to_string()),
            vehicle_number: vehicle_number.map(str::to_string),
        })
    }
}

impl SessionProvider for FixedSession {
    fn auth_data(&self) -> Option<AuthData> {
        self.code.as_ref().map(|code| AuthData {
            api_key: Some("test-key".to_string()),
            service_code: Some(code.clone()),
            user_info: UserInfo {
                role: self.role.clone(),
                vehicle_number: self.vehicle_number.clone(),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

/// Answers every request immediately and counts them per plant
#[derive(Default)]
pub struct CountingSource {
    calls: Mutex<Vec<String>>,
}

impl CountingSource {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QueueSource for CountingSource {
    async fn fetch_queue(&self, plant_id: &str) -> Result<Vec<Vehicle>, QueueError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(plant_id.to_string());
        Ok(vec![vehicle(calls.len() as i64, 1)])
    }
}

type Reply = oneshot::Sender<Result<Vec<Vehicle>, QueueError>>;

/// Holds every request open until the test answers it
#[derive(Default)]
pub struct GatedSource {
    pending: Mutex<Vec<Option<Reply>>>,
    started: AtomicUsize,
}

impl GatedSource {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Answer request `index` (in issue order). Returns false when the
    /// requester already gave up on it.
    pub fn resolve(&self, index: usize, result: Result<Vec<Vehicle>, QueueError>) -> bool {
        let reply = self.pending.lock().unwrap()[index].take();
        match reply {
            Some(reply) => reply.send(result).is_ok(),
            None => false,
        }
    }

    pub async fn wait_for(&self, count: usize) {
        while self.started() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl QueueSource for GatedSource {
    async fn fetch_queue(&self, _plant_id: &str) -> Result<Vec<Vehicle>, QueueError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(Some(tx));
        self.started.fetch_add(1, Ordering::SeqCst);
        rx.await
            .unwrap_or_else(|_| Err(QueueError::Network("reply dropped".to_string())))
    }
}

/// Records subscribe/unsubscribe calls in order and lets tests emit events
#[derive(Default)]
pub struct FakeTransport {
    log: Mutex<Vec<String>>,
    topics: Mutex<HashMap<String, UnboundedSender<PushEvent>>>,
}

impl FakeTransport {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics.lock().unwrap().contains_key(topic)
    }

    pub fn emit(&self, topic: &str, event: &str) -> bool {
        let topics = self.topics.lock().unwrap();
        match topics.get(topic) {
            Some(tx) => tx
                .send(PushEvent {
                    channel: topic.to_string(),
                    event: event.to_string(),
                    data: Value::Null,
                })
                .is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn subscribe(&self, topic: &str) -> Result<UnboundedReceiver<PushEvent>, PushError> {
        self.log.lock().unwrap().push(format!("subscribe {}", topic));
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics.lock().unwrap().insert(topic.to_string(), tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), PushError> {
        self.log.lock().unwrap().push(format!("unsubscribe {}", topic));
        self.topics.lock().unwrap().remove(topic);
        Ok(())
    }
}

/// Let spawned tasks run to their next await point
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
