//! CLI definition using clap

use clap::{ArgAction, Parser, Subcommand};
use queueboard_types::OutputFormat;

#[derive(Parser)]
#[command(name = "queueboard")]
#[command(author = "yuuji")]
#[command(version)]
#[command(about = "Live-ranked vehicle queue for batching plants")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json, table). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the ranked queue of a plant, refreshing live
    Watch {
        /// Plant (zone) identifier
        #[arg(long, short = 'p')]
        plant: String,

        /// Display name of the plant
        #[arg(long)]
        name: Option<String>,
    },

    /// Fetch the ranked queue once and print it
    Snapshot {
        /// Plant (zone) identifier
        #[arg(long, short = 'p')]
        plant: String,
    },

    /// List the plants the session can see
    Plants,

    /// Show or change display settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Manage the locally stored session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set the ranking API base URL
        #[arg(long)]
        set_api_base_url: Option<String>,

        /// Set the Pusher application key
        #[arg(long)]
        set_pusher_key: Option<String>,

        /// Set the Pusher cluster
        #[arg(long)]
        set_pusher_cluster: Option<String>,

        /// Set the polling interval in seconds
        #[arg(long)]
        set_poll_interval: Option<u64>,

        /// Set default output format
        #[arg(long)]
        set_output: Option<OutputFormat>,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show the effective settings
    Show,

    /// Set a display toggle (e.g. showMileage false)
    Set {
        key: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },

    /// Show or hide one factor score
    Factor {
        factor_id: i64,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },

    /// Show or hide a legend category (e.g. "Immediate Attention" true)
    Legend {
        label: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },

    /// Remove every stored override
    Reset,
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Show the stored session
    Show,

    /// Store session data obtained elsewhere
    Set {
        #[arg(long)]
        api_key: String,

        #[arg(long)]
        service_code: Option<String>,

        /// Composite `<serviceCode>:<user>` identifier
        #[arg(long)]
        user_id_ex: Option<String>,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        vehicle_number: Option<String>,

        /// Bearer token for the zone directory
        #[arg(long)]
        jwt_token: Option<String>,
    },

    /// Forget the session and its display settings
    Clear,
}
