//! Display settings: the effective (merged) object and the persisted user overrides

use crate::error::SettingsParseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Visibility of one factor score in the tooltip breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorSetting {
    pub factor_id: i64,
    pub name: String,
    pub priority: i64,
    pub show: bool,
}

/// Boolean display toggles, keyed as they are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DisplayToggle {
    ShowQueue,
    ShowAvailableSince,
    ShowLoadQty,
    ShowScore,
    ShowJobCount,
    ShowMileage,
    ShowJobQuantity,
    ShowJobHours,
    ShowFactorScores,
}

impl DisplayToggle {
    pub const ALL: [DisplayToggle; 9] = [
        DisplayToggle::ShowQueue,
        DisplayToggle::ShowAvailableSince,
        DisplayToggle::ShowLoadQty,
        DisplayToggle::ShowScore,
        DisplayToggle::ShowJobCount,
        DisplayToggle::ShowMileage,
        DisplayToggle::ShowJobQuantity,
        DisplayToggle::ShowJobHours,
        DisplayToggle::ShowFactorScores,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DisplayToggle::ShowQueue => "showQueue",
            DisplayToggle::ShowAvailableSince => "showAvailableSince",
            DisplayToggle::ShowLoadQty => "showLoadQty",
            DisplayToggle::ShowScore => "showScore",
            DisplayToggle::ShowJobCount => "showJobCount",
            DisplayToggle::ShowMileage => "showMileage",
            DisplayToggle::ShowJobQuantity => "showJobQuantity",
            DisplayToggle::ShowJobHours => "showJobHours",
            DisplayToggle::ShowFactorScores => "showFactorScores",
        }
    }

    /// Human-readable label for settings listings
    pub fn label(&self) -> &'static str {
        match self {
            DisplayToggle::ShowQueue => "Queue #",
            DisplayToggle::ShowAvailableSince => "Available Since",
            DisplayToggle::ShowLoadQty => "Load Qty",
            DisplayToggle::ShowScore => "Score",
            DisplayToggle::ShowJobCount => "Job Count",
            DisplayToggle::ShowMileage => "Mileage (KM)",
            DisplayToggle::ShowJobQuantity => "Job Quantity",
            DisplayToggle::ShowJobHours => "Job Hours",
            DisplayToggle::ShowFactorScores => "Factor Scores",
        }
    }
}

impl FromStr for DisplayToggle {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::UnknownSetting(s.to_string()))
    }
}

impl std::fmt::Display for DisplayToggle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Effective settings after merging defaults with user overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub show_queue: bool,
    pub show_available_since: bool,
    pub show_load_qty: bool,
    pub show_score: bool,
    pub show_job_count: bool,
    pub show_mileage: bool,
    pub show_job_quantity: bool,
    pub show_job_hours: bool,
    pub show_factor_scores: bool,
    pub factor_scores: Vec<FactorSetting>,
    pub legend: BTreeMap<String, bool>,
}

impl Settings {
    pub fn toggle(&self, toggle: DisplayToggle) -> bool {
        match toggle {
            DisplayToggle::ShowQueue => self.show_queue,
            DisplayToggle::ShowAvailableSince => self.show_available_since,
            DisplayToggle::ShowLoadQty => self.show_load_qty,
            DisplayToggle::ShowScore => self.show_score,
            DisplayToggle::ShowJobCount => self.show_job_count,
            DisplayToggle::ShowMileage => self.show_mileage,
            DisplayToggle::ShowJobQuantity => self.show_job_quantity,
            DisplayToggle::ShowJobHours => self.show_job_hours,
            DisplayToggle::ShowFactorScores => self.show_factor_scores,
        }
    }

    pub fn set_toggle(&mut self, toggle: DisplayToggle, value: bool) {
        let slot = match toggle {
            DisplayToggle::ShowQueue => &mut self.show_queue,
            DisplayToggle::ShowAvailableSince => &mut self.show_available_since,
            DisplayToggle::ShowLoadQty => &mut self.show_load_qty,
            DisplayToggle::ShowScore => &mut self.show_score,
            DisplayToggle::ShowJobCount => &mut self.show_job_count,
            DisplayToggle::ShowMileage => &mut self.show_mileage,
            DisplayToggle::ShowJobQuantity => &mut self.show_job_quantity,
            DisplayToggle::ShowJobHours => &mut self.show_job_hours,
            DisplayToggle::ShowFactorScores => &mut self.show_factor_scores,
        };
        *slot = value;
    }

    pub fn factor(&self, factor_id: i64) -> Option<&FactorSetting> {
        self.factor_scores.iter().find(|f| f.factor_id == factor_id)
    }

    /// Legend categories missing from the map stay visible
    pub fn legend_visible(&self, label: &str) -> bool {
        self.legend.get(label).copied().unwrap_or(true)
    }
}

/// Per-factor entry in the stored overrides. Only `factor_id` is required;
/// the seeded list also carries name and priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorOverride {
    pub factor_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
}

impl From<&FactorSetting> for FactorOverride {
    fn from(setting: &FactorSetting) -> Self {
        Self {
            factor_id: setting.factor_id,
            name: Some(setting.name.clone()),
            priority: Some(setting.priority),
            show: Some(setting.show),
        }
    }
}

const FACTOR_SCORES_KEY: &str = "factorScores";
const LEGEND_KEY: &str = "legend";

/// User overrides exactly as persisted. Boolean toggles are kept by key so
/// that keys this build does not know survive a read-modify-write.
/// Read through [`SettingsOverrides::parse`], never a derived deserializer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsOverrides {
    #[serde(flatten)]
    pub toggles: BTreeMap<String, bool>,

    #[serde(rename = "factorScores", skip_serializing_if = "Option::is_none")]
    pub factor_scores: Option<Vec<FactorOverride>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<BTreeMap<String, bool>>,
}

impl SettingsOverrides {
    /// Parse a stored blob. Only unreadable JSON or a non-object top level is
    /// an error; malformed fields inside the object are dropped.
    pub fn parse(raw: &str) -> Result<Self, SettingsParseError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| SettingsParseError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, SettingsParseError> {
        let Value::Object(map) = value else {
            return Err(SettingsParseError::NotAnObject);
        };

        let mut overrides = SettingsOverrides::default();
        for (key, value) in map {
            match key.as_str() {
                FACTOR_SCORES_KEY => {
                    // Anything but a well-formed sequence counts as absent
                    overrides.factor_scores = serde_json::from_value(value).ok();
                }
                LEGEND_KEY => {
                    if let Value::Object(entries) = value {
                        overrides.legend = Some(
                            entries
                                .into_iter()
                                .filter_map(|(label, v)| v.as_bool().map(|b| (label, b)))
                                .collect(),
                        );
                    }
                }
                _ => {
                    if let Some(b) = value.as_bool() {
                        overrides.toggles.insert(key, b);
                    }
                }
            }
        }
        Ok(overrides)
    }

    pub fn toggle(&self, toggle: DisplayToggle) -> Option<bool> {
        self.toggles.get(toggle.key()).copied()
    }

    pub fn set_toggle(&mut self, toggle: DisplayToggle, value: bool) {
        self.toggles.insert(toggle.key().to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty() && self.factor_scores.is_none() && self.legend.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_valid_fields() {
        let raw = r#"{
            "showQueue": false,
            "showMileage": "yes",
            "futureToggle": true,
            "factorScores": [{"factor_id": 6, "show": false}],
            "legend": {"Priority": false, "Compensate": 1}
        }"#;
        let overrides = SettingsOverrides::parse(raw).unwrap();

        assert_eq!(overrides.toggle(DisplayToggle::ShowQueue), Some(false));
        assert_eq!(overrides.toggle(DisplayToggle::ShowMileage), None);
        assert_eq!(overrides.toggles.get("futureToggle"), Some(&true));

        let factors = overrides.factor_scores.unwrap();
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].show, Some(false));

        let legend = overrides.legend.unwrap();
        assert_eq!(legend.get("Priority"), Some(&false));
        assert!(!legend.contains_key("Compensate"));
    }

    #[test]
    fn test_parse_malformed_factor_list_is_absent() {
        let overrides =
            SettingsOverrides::parse(r#"{"factorScores": {"6": false}, "showScore": true}"#).unwrap();
        assert!(overrides.factor_scores.is_none());
        assert_eq!(overrides.toggle(DisplayToggle::ShowScore), Some(true));

        let overrides = SettingsOverrides::parse(r#"{"factorScores": [{"name": "x"}]}"#).unwrap();
        assert!(overrides.factor_scores.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            SettingsOverrides::parse("{not json"),
            Err(SettingsParseError::InvalidJson(_))
        ));
        assert!(matches!(
            SettingsOverrides::parse("[1, 2]"),
            Err(SettingsParseError::NotAnObject)
        ));
    }

    #[test]
    fn test_overrides_serialize_flat() {
        let mut overrides = SettingsOverrides::default();
        overrides.set_toggle(DisplayToggle::ShowQueue, false);
        let json = serde_json::to_value(&overrides).unwrap();
        assert_eq!(json, serde_json::json!({"showQueue": false}));

        let back = SettingsOverrides::from_value(json).unwrap();
        assert_eq!(back, overrides);
    }

    #[test]
    fn test_toggle_from_str() {
        assert_eq!(
            "showFactorScores".parse::<DisplayToggle>().unwrap(),
            DisplayToggle::ShowFactorScores
        );
        assert_eq!(
            "showqueue".parse::<DisplayToggle>().unwrap(),
            DisplayToggle::ShowQueue
        );
        assert!("showEverything".parse::<DisplayToggle>().is_err());
    }
}
