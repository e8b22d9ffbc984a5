//! Reconciles a vehicle's live factor list with the factor visibility settings

use queueboard_types::{FactorScore, Settings, Vehicle};

/// Factor scores to show for a vehicle, most important first.
///
/// Factors the settings do not list stay visible, so a factor the server
/// starts sending before the defaults table knows it is not hidden.
pub fn visible_factor_scores<'a>(vehicle: &'a Vehicle, settings: &Settings) -> Vec<&'a FactorScore> {
    let mut scores: Vec<&FactorScore> = vehicle
        .raw_score
        .iter()
        .filter(|score| {
            settings
                .factor(score.factor_id)
                .map(|setting| setting.show)
                .unwrap_or(true)
        })
        .collect();
    scores.sort_by_key(|score| score.priority);
    scores
}
