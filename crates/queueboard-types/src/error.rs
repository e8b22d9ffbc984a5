//! Error types for queueboard

use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("`{0}` is not set; use `queueboard config` or the environment")]
    Missing(&'static str),
}

/// Key-value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store key: {0}")]
    InvalidKey(String),

    #[error("Store IO error: {0}")]
    IoError(String),
}

/// Errors raised while fetching the ranked vehicle queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The request was superseded by a newer one. Never shown to the user.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out")]
    Timeout,

    #[error("Server responded with {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode vehicle queue: {0}")]
    Decode(String),
}

impl QueueError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueueError::Cancelled)
    }
}

/// Push-channel transport errors
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push transport is not configured: {0}")]
    NotConfigured(String),

    #[error("Push connection failed: {0}")]
    Connection(String),

    #[error("Malformed push frame: {0}")]
    Protocol(String),
}

/// Stored settings blob could not be read
#[derive(Debug, Error)]
pub enum SettingsParseError {
    #[error("Stored settings are not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Stored settings must be a JSON object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Push channel error: {0}")]
    Push(#[from] PushError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsParseError),

    #[error("Failed to fetch vehicle queue: {0}")]
    Fetch(String),

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("No session data; run `queueboard session set` first")]
    NoSession,

    #[error("Display settings can only be changed by an Operator (session role: {0})")]
    SettingsLocked(String),
}

pub type Result<T> = std::result::Result<T, Error>;
