//! Adapters from configuration to the store, session and network clients

use std::path::PathBuf;
use std::sync::Arc;

use queueboard_domain::SessionProvider;
use queueboard_infra::{
    HttpPlantDirectory, HttpQueueSource, PusherClient, PusherConfig, StoredSession,
};
use queueboard_store::{FileStore, KeyValueStore};
use queueboard_types::Result;

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::debounce::Debouncer;
use crate::fetch::{FetchMode, QueueFetcher};
use crate::live_channel::LiveChannel;
use crate::settings_manager::SettingsManager;

/// Open the file-based key-value store
pub fn open_store(config: &Config) -> Result<Arc<FileStore>> {
    let data_dir = config.data_dir()?;
    open_store_at(data_dir)
}

/// Open the file-based key-value store at a custom directory
pub fn open_store_at(data_dir: PathBuf) -> Result<Arc<FileStore>> {
    Ok(Arc::new(FileStore::open(data_dir)?))
}

pub fn open_session(store: Arc<dyn KeyValueStore>) -> Arc<StoredSession> {
    Arc::new(StoredSession::new(store))
}

pub fn open_settings(
    store: Arc<dyn KeyValueStore>,
    session: Arc<dyn SessionProvider>,
) -> Arc<SettingsManager> {
    Arc::new(SettingsManager::new(store, session))
}

pub fn open_queue_source(
    config: &Config,
    session: Arc<dyn SessionProvider>,
) -> Result<HttpQueueSource> {
    let base_url = config.require_api_base_url()?;
    Ok(HttpQueueSource::new(
        base_url,
        config.request_timeout(),
        session,
    )?)
}

pub fn open_plant_directory(
    config: &Config,
    session: Arc<dyn SessionProvider>,
) -> Result<HttpPlantDirectory> {
    Ok(HttpPlantDirectory::new(
        config.directory_base_url.clone(),
        config.request_timeout(),
        session,
    )?)
}

/// Pusher client for the configured app, `None` when live updates are off
pub fn open_push_client(config: &Config) -> Result<Option<Arc<PusherClient>>> {
    if !config.live_updates_configured() {
        return Ok(None);
    }
    let pusher = PusherClient::new(PusherConfig::new(
        config.pusher_key.clone(),
        config.pusher_cluster.clone(),
    ))?;
    Ok(Some(Arc::new(pusher)))
}

/// Assemble a dashboard over the HTTP queue source. The push client, when
/// configured, is returned so the caller controls its connection.
pub fn open_dashboard(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
) -> Result<(Dashboard, Option<Arc<PusherClient>>)> {
    let session = open_session(store.clone());
    let source = open_queue_source(config, session.clone())?;
    let fetcher = QueueFetcher::new(Arc::new(source), config.live_window());
    let settings = open_settings(store, session.clone());

    let pusher = open_push_client(config)?;
    let live = pusher.as_ref().map(|client| {
        let refresher = fetcher.clone();
        let debouncer = Debouncer::new(config.debounce_window(), move || {
            refresher.spawn_fetch(FetchMode::Silent);
        });
        LiveChannel::new(client.clone(), debouncer)
    });

    let dashboard = Dashboard::new(fetcher, settings, session, live, config.poll_interval());
    Ok((dashboard, pusher))
}
