//! Default display settings per service code
//!
//! Two profiles exist: the standard profile shows everything, the restricted
//! profile hides the factor-score breakdown and most legend categories.

use queueboard_types::{FactorSetting, LegendCategory, Settings};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Service codes that get the restricted profile
pub const RESTRICTED_SERVICE_CODES: [&str; 2] = ["SGP", "Default"];

/// Factor catalog in display order: (factor_id, name, priority)
const FACTOR_CATALOG: [(i64, &str, i64); 11] = [
    (17, "Driver Ready", 1),
    (13, "Vehicle Breakdown", 2),
    (6, "Trial Mix", 7),
    (18, "Assigned Jobs", 9),
    (19, "Load Qty (Cumulative)", 8),
    (2, "Priority Vehicle", 3),
    (3, "1st Ticket", 4),
    (20, "Distance Travelled", 8),
    (21, "Job Hours", 9),
    (22, "Plant to Site Distance", 10),
    (16, "Order Cancel", 6),
];

fn factor_list(show: bool) -> Vec<FactorSetting> {
    FACTOR_CATALOG
        .iter()
        .map(|&(factor_id, name, priority)| FactorSetting {
            factor_id,
            name: name.to_string(),
            priority,
            show,
        })
        .collect()
}

fn legend(visible: impl Fn(LegendCategory) -> bool) -> BTreeMap<String, bool> {
    LegendCategory::ALL
        .into_iter()
        .map(|c| (c.label().to_string(), visible(c)))
        .collect()
}

/// Profile for every service code outside the restricted set
pub static STANDARD_DEFAULTS: LazyLock<Settings> = LazyLock::new(|| Settings {
    show_queue: true,
    show_available_since: true,
    show_load_qty: true,
    show_score: true,
    show_job_count: true,
    show_mileage: true,
    show_job_quantity: true,
    show_job_hours: true,
    show_factor_scores: true,
    factor_scores: factor_list(true),
    legend: legend(|_| true),
});

/// Profile for restricted service codes
pub static RESTRICTED_DEFAULTS: LazyLock<Settings> = LazyLock::new(|| Settings {
    show_factor_scores: false,
    factor_scores: factor_list(false),
    legend: legend(|c| c == LegendCategory::Recommendation),
    ..STANDARD_DEFAULTS.clone()
});

/// Check whether a service code maps to the restricted profile
pub fn is_restricted(service_code: Option<&str>) -> bool {
    service_code
        .map(|code| RESTRICTED_SERVICE_CODES.contains(&code))
        .unwrap_or(false)
}

/// Defaults for a service code. Unknown or absent codes get the standard
/// profile. Returns an owned copy the caller may mutate freely.
pub fn default_settings(service_code: Option<&str>) -> Settings {
    if is_restricted(service_code) {
        RESTRICTED_DEFAULTS.clone()
    } else {
        STANDARD_DEFAULTS.clone()
    }
}

/// Legend labels the profile for this service code knows about
pub fn available_legend_options(service_code: Option<&str>) -> Vec<String> {
    let defaults = if is_restricted(service_code) {
        &*RESTRICTED_DEFAULTS
    } else {
        &*STANDARD_DEFAULTS
    };
    // Keep the on-screen legend order rather than the map's sort order
    LegendCategory::ALL
        .into_iter()
        .map(|c| c.label().to_string())
        .filter(|label| defaults.legend.contains_key(label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restricted_codes() {
        for code in RESTRICTED_SERVICE_CODES {
            let settings = default_settings(Some(code));
            assert!(!settings.show_factor_scores, "{}", code);
            assert!(settings.factor_scores.iter().all(|f| !f.show), "{}", code);
            assert_eq!(settings.legend.get("Recommendation"), Some(&true));
            assert_eq!(settings.legend.get("Priority"), Some(&false));
        }
    }

    #[test]
    fn test_unknown_and_absent_codes_use_standard() {
        for code in [None, Some("ICPL"), Some(""), Some("sgp")] {
            let settings = default_settings(code);
            assert!(settings.show_factor_scores);
            assert!(settings.factor_scores.iter().all(|f| f.show));
            assert!(settings.legend.values().all(|&v| v));
        }
    }

    #[test]
    fn test_factor_catalog_order() {
        let ids: Vec<i64> = default_settings(None)
            .factor_scores
            .iter()
            .map(|f| f.factor_id)
            .collect();
        assert_eq!(ids, vec![17, 13, 6, 18, 19, 2, 3, 20, 21, 22, 16]);
    }

    #[test]
    fn test_defaults_are_independent_copies() {
        let mut a = default_settings(None);
        a.show_queue = false;
        a.factor_scores.clear();
        let b = default_settings(None);
        assert!(b.show_queue);
        assert_eq!(b.factor_scores.len(), 11);
    }

    #[test]
    fn test_available_legend_options_order() {
        assert_eq!(
            available_legend_options(Some("SGP")),
            vec!["Immediate Attention", "Recommendation", "Priority", "Compensate"]
        );
    }
}
