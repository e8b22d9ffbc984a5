//! Command handlers

use std::sync::Arc;
use std::time::Duration;

use crate::cli::{Cli, Commands, SessionAction, SettingsAction};
use crate::output::{output_plants, output_queue, output_session, output_settings, render_queue};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use queueboard_app::config::Config;
use queueboard_app::repository::{
    open_dashboard, open_plant_directory, open_queue_source, open_session, open_settings,
    open_store,
};
use queueboard_app::{QueueFetcher, QueueState, SettingsManager};
use queueboard_domain::SessionProvider;
use queueboard_store::KeyValueStore;
use queueboard_types::{AuthData, DisplayToggle, Error, OutputFormat, Plant, Result, UserInfo};
use tracing::warn;

/// Plant shown when the zone directory cannot be reached
const FALLBACK_PLANT_ID: &str = "1";
const FALLBACK_PLANT_NAME: &str = "SK";

pub fn execute(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let output_format = cli.format.unwrap_or(config.output_format);

    match &cli.command {
        Commands::Watch { plant, name } => {
            cmd_watch(&config, output_format, plant.clone(), name.clone())
        }
        Commands::Snapshot { plant } => cmd_snapshot(&config, output_format, plant.clone()),
        Commands::Plants => cmd_plants(&config, output_format),
        Commands::Settings { action } => cmd_settings(&config, output_format, action),
        Commands::Session { action } => cmd_session(&config, output_format, action),
        Commands::Config {
            show,
            set_api_base_url,
            set_pusher_key,
            set_pusher_cluster,
            set_poll_interval,
            set_output,
            reset,
        } => cmd_config(
            *show,
            set_api_base_url.clone(),
            set_pusher_key.clone(),
            set_pusher_cluster.clone(),
            *set_poll_interval,
            *set_output,
            *reset,
        ),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn open_manager(config: &Config) -> Result<Arc<SettingsManager>> {
    let store: Arc<dyn KeyValueStore> = open_store(config)?;
    Ok(open_settings(store.clone(), open_session(store)))
}

fn loading_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Loading vehicle queue...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn cmd_watch(
    config: &Config,
    output_format: OutputFormat,
    plant_id: String,
    name: Option<String>,
) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = open_store(config)?;
    require_session(&*open_session(store.clone()))?;
    let (dashboard, pusher) = open_dashboard(config, store)?;
    let own_vehicle = dashboard.own_vehicle_number();
    let plant_name = name.unwrap_or_else(|| plant_id.clone());

    runtime()?.block_on(async {
        if let Some(ref pusher) = pusher {
            pusher.connect();
        } else {
            eprintln!("Live updates off (no Pusher key/cluster configured); polling only");
        }

        let mut states = dashboard.subscribe();
        dashboard
            .select_plant(Some(Plant::new(plant_id, plant_name.clone())))
            .await;

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut spinner: Option<ProgressBar> = None;

        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state: QueueState = states.borrow_and_update().clone();

                    if state.loading {
                        if spinner.is_none() && output_format == OutputFormat::Table {
                            spinner = Some(loading_spinner());
                        }
                        continue;
                    }
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }

                    if !state.vehicles.is_empty() {
                        if let Err(e) = dashboard.on_vehicles_loaded(&state.vehicles) {
                            warn!("Failed to seed factor settings: {}", e);
                        }
                    }

                    let settings = dashboard.settings().get_settings();
                    if output_format == OutputFormat::Json {
                        output_queue(
                            output_format,
                            &state,
                            &settings,
                            Some(&plant_name),
                            own_vehicle.as_deref(),
                        )?;
                    } else {
                        // Clear screen and home the cursor before redrawing
                        print!("\x1B[2J\x1B[H");
                        print!(
                            "{}",
                            render_queue(&state, &settings, Some(&plant_name), own_vehicle.as_deref())
                        );
                        let live = if dashboard.fetcher().is_live(Utc::now()) { "live" } else { "stale" };
                        println!("\n[{}] Ctrl-C to exit", live);
                    }
                }
                _ = &mut ctrl_c => break,
            }
        }

        if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
        dashboard.shutdown().await;
        if let Some(ref pusher) = pusher {
            pusher.disconnect();
        }
        Ok::<(), Error>(())
    })
}

fn cmd_snapshot(config: &Config, output_format: OutputFormat, plant_id: String) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = open_store(config)?;
    let session = open_session(store.clone());
    require_session(&*session)?;
    let own_vehicle = session.vehicle_number();
    let source = open_queue_source(config, session.clone())?;
    let settings = open_settings(store, session);

    let state = runtime()?.block_on(async {
        let fetcher = QueueFetcher::new(Arc::new(source), config.live_window());
        fetcher.set_plant(Some(plant_id));
        let spinner = (output_format == OutputFormat::Table).then(loading_spinner);
        fetcher.retry().await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        fetcher.state()
    });

    if let Some(error) = state.error {
        return Err(Error::Fetch(error));
    }
    if let Err(e) = settings.initialize_factor_scores(&state.vehicles) {
        warn!("Failed to seed factor settings: {}", e);
    }
    output_queue(
        output_format,
        &state,
        &settings.get_settings(),
        None,
        own_vehicle.as_deref(),
    )
}

/// The queue endpoints need the session's API key and instance
fn require_session(session: &dyn SessionProvider) -> Result<()> {
    match session.auth_data() {
        Some(_) => Ok(()),
        None => Err(Error::NoSession),
    }
}

fn cmd_plants(config: &Config, output_format: OutputFormat) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = open_store(config)?;
    let directory = open_plant_directory(config, open_session(store))?;

    let plants = match runtime()?.block_on(directory.list_plants()) {
        Ok(plants) => plants,
        Err(e) => {
            warn!("Failed to fetch plants: {}", e);
            eprintln!("Zone directory unavailable ({}); showing default plant", e);
            vec![Plant::new(FALLBACK_PLANT_ID, FALLBACK_PLANT_NAME)]
        }
    };
    output_plants(output_format, &plants)
}

fn cmd_settings(config: &Config, output_format: OutputFormat, action: &SettingsAction) -> Result<()> {
    let manager = open_manager(config)?;
    if !matches!(action, SettingsAction::Show) {
        ensure_operator(&manager)?;
    }

    let settings = match action {
        SettingsAction::Show => manager.get_settings(),
        SettingsAction::Set { key, value } => {
            let toggle: DisplayToggle = key.parse()?;
            warn_if_restricted(&manager, toggle.key());
            manager.update_setting(toggle, *value)?
        }
        SettingsAction::Factor { factor_id, value } => {
            if manager.factor_score_by_id(*factor_id).is_none() {
                return Err(Error::UnknownSetting(format!("factor {}", factor_id)));
            }
            warn_if_restricted(&manager, &format!("factorScores.{}", factor_id));
            manager.update_factor_score(*factor_id, *value)?
        }
        SettingsAction::Legend { label, value } => {
            if !manager.available_legend_options().contains(label) {
                return Err(Error::UnknownSetting(format!("legend \"{}\"", label)));
            }
            manager.update_legend_setting(label, *value)?
        }
        SettingsAction::Reset => {
            let settings = manager.reset_to_defaults()?;
            println!("Display settings reset to defaults");
            settings
        }
    };

    output_settings(
        output_format,
        &settings,
        &manager.current_service_code(),
        manager.is_restricted(),
    )
}

fn ensure_operator(manager: &SettingsManager) -> Result<()> {
    if manager.can_edit_settings() {
        Ok(())
    } else {
        let role = manager.role().unwrap_or_else(|| "none".to_string());
        Err(Error::SettingsLocked(role))
    }
}

fn warn_if_restricted(manager: &SettingsManager, key: &str) {
    if !manager.can_modify_setting(key) {
        eprintln!(
            "Note: `{}` is managed for service code {}; the change is stored anyway",
            key,
            manager.current_service_code()
        );
    }
}

fn cmd_session(config: &Config, output_format: OutputFormat, action: &SessionAction) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = open_store(config)?;
    let session = open_session(store);

    match action {
        SessionAction::Show => output_session(output_format, session.auth_data().as_ref()),
        SessionAction::Set {
            api_key,
            service_code,
            user_id_ex,
            role,
            vehicle_number,
            jwt_token,
        } => {
            let auth = AuthData {
                jwt_token: jwt_token.clone(),
                api_key: Some(api_key.clone()),
                service_code: service_code.clone(),
                user_info: UserInfo {
                    user_id_ex: user_id_ex.clone(),
                    role: role.clone(),
                    vehicle_number: vehicle_number.clone(),
                    ..Default::default()
                },
                login_time: Some(Utc::now()),
                ..Default::default()
            };
            session.save(&auth)?;
            println!("Session saved");
            output_session(output_format, session.auth_data().as_ref())
        }
        SessionAction::Clear => {
            session.clear()?;
            println!("Session and display settings cleared");
            Ok(())
        }
    }
}

fn cmd_config(
    show: bool,
    set_api_base_url: Option<String>,
    set_pusher_key: Option<String>,
    set_pusher_cluster: Option<String>,
    set_poll_interval: Option<u64>,
    set_output: Option<OutputFormat>,
    reset: bool,
) -> Result<()> {
    if reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        println!("\n{}", config);
        return Ok(());
    }

    // Edit the file as written; environment overrides are not persisted
    let mut config = Config::load_file()?;
    let mut modified = false;

    if let Some(url) = set_api_base_url {
        config.api_base_url = url;
        modified = true;
    }

    if let Some(key) = set_pusher_key {
        config.pusher_key = key;
        modified = true;
    }

    if let Some(cluster) = set_pusher_cluster {
        config.pusher_cluster = cluster;
        modified = true;
    }

    if let Some(secs) = set_poll_interval {
        config.poll_interval_secs = secs;
        modified = true;
    }

    if let Some(output_format) = set_output {
        config.output_format = output_format;
        modified = true;
    }

    if modified {
        config.save()?;
        println!("Configuration saved");
    }

    if show || !modified {
        println!("{}", config);
    }

    Ok(())
}
