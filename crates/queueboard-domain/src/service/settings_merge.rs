//! Settings merge: service-code defaults layered under stored user overrides

use crate::defaults::default_settings;
use queueboard_types::{DisplayToggle, FactorOverride, FactorSetting, Settings, SettingsOverrides};

/// Effective settings for a service code and the stored overrides
pub fn compute_effective_settings(
    service_code: Option<&str>,
    overrides: &SettingsOverrides,
) -> Settings {
    merge_settings(default_settings(service_code), overrides)
}

/// Layer overrides on top of a defaults object
///
/// - toggles: stored value wins, otherwise the default
/// - factor scores: the default list is the ordered skeleton; only `show` is
///   taken from a stored entry with the same `factor_id`
/// - legend: shallow merge, stored keys win
pub fn merge_settings(defaults: Settings, overrides: &SettingsOverrides) -> Settings {
    let mut merged = defaults;

    for toggle in DisplayToggle::ALL {
        if let Some(value) = overrides.toggle(toggle) {
            merged.set_toggle(toggle, value);
        }
    }

    if let Some(ref stored) = overrides.factor_scores {
        merged.factor_scores = merge_factor_scores(merged.factor_scores, stored);
    }

    if let Some(ref stored) = overrides.legend {
        for (label, &visible) in stored {
            merged.legend.insert(label.clone(), visible);
        }
    }

    merged
}

/// Overlay stored visibility onto the default factor list. Stored factors
/// the defaults no longer list are dropped.
fn merge_factor_scores(
    defaults: Vec<FactorSetting>,
    stored: &[FactorOverride],
) -> Vec<FactorSetting> {
    defaults
        .into_iter()
        .map(|mut factor| {
            let stored_show = stored
                .iter()
                .find(|s| s.factor_id == factor.factor_id)
                .and_then(|s| s.show);
            if let Some(show) = stored_show {
                factor.show = show;
            }
            factor
        })
        .collect()
}
