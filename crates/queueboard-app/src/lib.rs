//! Application service layer - config, settings, queue refresh coordination

pub mod config;
pub mod dashboard;
pub mod debounce;
pub mod fetch;
pub mod live_channel;
pub mod polling;
pub mod repository;
pub mod settings_manager;

pub use dashboard::Dashboard;
pub use debounce::Debouncer;
pub use fetch::{FetchMode, FetchToken, QueueFetcher, QueueState};
pub use live_channel::{ranking_topic, ChannelState, LiveChannel, RANKING_EVENT};
pub use polling::PollingScheduler;
pub use settings_manager::SettingsManager;
