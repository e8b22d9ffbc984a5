//! Domain services

pub mod factor_display;
pub mod settings_merge;

pub use factor_display::visible_factor_scores;
pub use settings_merge::{compute_effective_settings, merge_settings};
