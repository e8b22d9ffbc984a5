//! Configuration management for queueboard
//!
//! Config stored at: ~/.config/queueboard/config.json

use queueboard_types::{ConfigError, OutputFormat, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_API_BASE_URL: &str = "QUEUEBOARD_API_BASE_URL";
pub const ENV_PUSHER_KEY: &str = "QUEUEBOARD_PUSHER_KEY";
pub const ENV_PUSHER_CLUSTER: &str = "QUEUEBOARD_PUSHER_CLUSTER";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the ranking API (`/vehicle/priority` lives under it)
    #[serde(default)]
    pub api_base_url: String,

    /// Base URL of the account/zone directory service
    #[serde(default = "default_directory_base_url")]
    pub directory_base_url: String,

    /// Pusher application key; live updates are off without it
    #[serde(default)]
    pub pusher_key: String,

    #[serde(default)]
    pub pusher_cluster: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long after the last successful fetch the queue counts as live
    #[serde(default = "default_live_window_secs")]
    pub live_window_secs: u64,

    /// Default output format (json, table)
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Key-value store directory override
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_directory_base_url() -> String {
    "https://findplus.w-locate.com:8443/integration".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_live_window_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            directory_base_url: default_directory_base_url(),
            pusher_key: String::new(),
            pusher_cluster: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            debounce_ms: default_debounce_ms(),
            live_window_secs: default_live_window_secs(),
            output_format: OutputFormat::Table,
            data_dir: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join("queueboard");
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Get the key-value store directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or(ConfigError::NotFound)?
            .join("queueboard");
        Ok(data_dir)
    }

    /// Load config from file (or defaults), then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load config from file only, or create default
    pub fn load_file() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .map_err(|e| ConfigError::SaveError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Overlay non-empty environment values onto the loaded file
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(key) = get(ENV_PUSHER_KEY) {
            self.pusher_key = key;
        }
        if let Some(cluster) = get(ENV_PUSHER_CLUSTER) {
            self.pusher_cluster = cluster;
        }
    }

    pub fn require_api_base_url(&self) -> Result<&str> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Missing("api_base_url").into());
        }
        Ok(&self.api_base_url)
    }

    pub fn live_updates_configured(&self) -> bool {
        !self.pusher_key.trim().is_empty() && !self.pusher_cluster.trim().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn live_window(&self) -> Duration {
        Duration::from_secs(self.live_window_secs)
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let or_unset = |s: &str| {
            if s.is_empty() {
                "(not set)".to_string()
            } else {
                s.to_string()
            }
        };

        writeln!(f, "Queueboard Configuration")?;
        writeln!(f, "========================")?;
        writeln!(f)?;
        writeln!(f, "API base URL:      {}", or_unset(&self.api_base_url))?;
        writeln!(f, "Directory URL:     {}", self.directory_base_url)?;
        writeln!(f, "Pusher key:        {}", or_unset(&self.pusher_key))?;
        writeln!(f, "Pusher cluster:    {}", or_unset(&self.pusher_cluster))?;
        writeln!(f, "Request timeout:   {}s", self.request_timeout_secs)?;
        writeln!(f, "Poll interval:     {}s", self.poll_interval_secs)?;
        writeln!(f, "Debounce window:   {}ms", self.debounce_ms)?;
        writeln!(f, "Live window:       {}s", self.live_window_secs)?;
        writeln!(f, "Output format:     {}", self.output_format)?;
        writeln!(
            f,
            "Data dir:          {}",
            self.data_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "(error)".to_string())
        )?;

        if let Ok(path) = Self::config_path() {
            writeln!(f)?;
            writeln!(f, "Config file:       {}", path.display())?;
        }

        Ok(())
    }
}
