//! Domain layer: settings defaults, the services that merge them, and the
//! traits the outer layers implement

pub mod defaults;
pub mod repository;
pub mod service;

pub use defaults::{available_legend_options, default_settings, is_restricted, RESTRICTED_SERVICE_CODES};
pub use repository::{PushTransport, QueueSource, SessionProvider};
pub use service::{compute_effective_settings, merge_settings, visible_factor_scores};
