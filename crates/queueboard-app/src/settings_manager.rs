//! Display settings for the current session
//!
//! Only the user's overrides are persisted (under `atss_settings`). Every read
//! re-merges them with the defaults of the service code the session carries
//! at that moment, so a service-code change re-derives cleanly.

use std::sync::{Arc, Mutex, MutexGuard};

use queueboard_domain::{
    available_legend_options, compute_effective_settings, default_settings, is_restricted,
    SessionProvider,
};
use queueboard_store::{KeyValueStore, SETTINGS_KEY};
use queueboard_types::{
    DisplayToggle, FactorOverride, FactorSetting, Result, Settings, SettingsOverrides, Vehicle,
};
use tracing::{debug, warn};

/// Shown when the session carries no service code
pub const UNKNOWN_SERVICE_CODE: &str = "Unknown";

/// Setting keys a restricted service code is not meant to change
const RESTRICTED_KEYS: [&str; 2] = ["showFactorScores", "factorScores"];

pub struct SettingsManager {
    store: Arc<dyn KeyValueStore>,
    session: Arc<dyn SessionProvider>,
    /// Serializes read-modify-write cycles on the stored overrides
    write_lock: Mutex<()>,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn KeyValueStore>, session: Arc<dyn SessionProvider>) -> Self {
        Self {
            store,
            session,
            write_lock: Mutex::new(()),
        }
    }

    fn service_code(&self) -> Option<String> {
        self.session.service_code()
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overrides as stored. A missing, unreadable or corrupt blob reads as
    /// empty overrides.
    pub fn stored_overrides(&self) -> SettingsOverrides {
        let raw = match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SettingsOverrides::default(),
            Err(e) => {
                warn!("Failed to read stored settings: {}", e);
                return SettingsOverrides::default();
            }
        };
        SettingsOverrides::parse(&raw).unwrap_or_else(|e| {
            warn!("Ignoring stored settings: {}", e);
            SettingsOverrides::default()
        })
    }

    fn save_overrides(&self, overrides: &SettingsOverrides) -> Result<()> {
        let content = serde_json::to_string_pretty(overrides)?;
        self.store.set(SETTINGS_KEY, &content)
    }

    fn effective(&self, overrides: &SettingsOverrides) -> Settings {
        compute_effective_settings(self.service_code().as_deref(), overrides)
    }

    /// Read the latest overrides, apply one change, persist the full object
    /// and return the recomputed settings
    fn mutate<F>(&self, change: F) -> Result<Settings>
    where
        F: FnOnce(&mut SettingsOverrides, &Settings),
    {
        let _guard = self.lock_writes();
        let mut overrides = self.stored_overrides();
        let defaults = default_settings(self.service_code().as_deref());
        change(&mut overrides, &defaults);
        self.save_overrides(&overrides)?;
        Ok(self.effective(&overrides))
    }

    pub fn get_settings(&self) -> Settings {
        self.effective(&self.stored_overrides())
    }

    /// Seed the stored factor list from the current defaults the first time
    /// vehicles arrive. Returns whether anything was written.
    pub fn initialize_factor_scores(&self, vehicles: &[Vehicle]) -> Result<bool> {
        if vehicles.is_empty() {
            return Ok(false);
        }

        let _guard = self.lock_writes();
        let mut overrides = self.stored_overrides();
        if overrides.factor_scores.is_some() {
            return Ok(false);
        }

        let defaults = default_settings(self.service_code().as_deref());
        overrides.factor_scores = Some(seed_factor_scores(&defaults));
        self.save_overrides(&overrides)?;
        debug!("Seeded {} factor score settings", defaults.factor_scores.len());
        Ok(true)
    }

    pub fn update_setting(&self, toggle: DisplayToggle, value: bool) -> Result<Settings> {
        self.mutate(|overrides, _| overrides.set_toggle(toggle, value))
    }

    /// Show or hide one factor. A factor the defaults do not know leaves the
    /// stored list unchanged.
    pub fn update_factor_score(&self, factor_id: i64, enabled: bool) -> Result<Settings> {
        self.mutate(|overrides, defaults| {
            let factors = overrides
                .factor_scores
                .get_or_insert_with(|| seed_factor_scores(defaults));
            if let Some(entry) = factors.iter_mut().find(|f| f.factor_id == factor_id) {
                entry.show = Some(enabled);
            } else if let Some(default) = defaults.factor(factor_id) {
                let mut entry = FactorOverride::from(default);
                entry.show = Some(enabled);
                factors.push(entry);
            } else {
                debug!("Ignoring visibility change for unknown factor {}", factor_id);
            }
        })
    }

    pub fn update_legend_setting(&self, label: &str, enabled: bool) -> Result<Settings> {
        self.mutate(|overrides, defaults| {
            overrides
                .legend
                .get_or_insert_with(|| defaults.legend.clone())
                .insert(label.to_string(), enabled);
        })
    }

    /// Drop every stored override and return the current defaults
    pub fn reset_to_defaults(&self) -> Result<Settings> {
        let _guard = self.lock_writes();
        self.store.remove(SETTINGS_KEY)?;
        Ok(default_settings(self.service_code().as_deref()))
    }

    pub fn enabled_factor_scores(&self) -> Vec<FactorSetting> {
        self.get_settings()
            .factor_scores
            .into_iter()
            .filter(|f| f.show)
            .collect()
    }

    pub fn factor_score_by_id(&self, factor_id: i64) -> Option<FactorSetting> {
        self.get_settings()
            .factor_scores
            .into_iter()
            .find(|f| f.factor_id == factor_id)
    }

    pub fn available_legend_options(&self) -> Vec<String> {
        available_legend_options(self.service_code().as_deref())
    }

    pub fn current_service_code(&self) -> String {
        self.service_code()
            .unwrap_or_else(|| UNKNOWN_SERVICE_CODE.to_string())
    }

    pub fn role(&self) -> Option<String> {
        self.session.role()
    }

    /// Only operators get to edit display settings at all
    pub fn can_edit_settings(&self) -> bool {
        self.session.is_operator()
    }

    pub fn is_restricted(&self) -> bool {
        is_restricted(self.service_code().as_deref())
    }

    /// Whether the UI should offer the setting for editing. Advisory only;
    /// the update methods do not consult it.
    pub fn can_modify_setting(&self, key: &str) -> bool {
        if !self.is_restricted() {
            return true;
        }
        !RESTRICTED_KEYS
            .iter()
            .any(|restricted| key == *restricted || key.starts_with(&format!("{}.", restricted)))
    }
}

fn seed_factor_scores(defaults: &Settings) -> Vec<FactorOverride> {
    defaults.factor_scores.iter().map(FactorOverride::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use queueboard_store::MemoryStore;
    use queueboard_types::{AuthData, UserInfo};

    struct FixedSession(Option<&'static str>);

    impl SessionProvider for FixedSession {
        fn auth_data(&self) -> Option<AuthData> {
            self.0.map(|code| AuthData {
                service_code: Some(code.to_string()),
                user_info: UserInfo::default(),
                ..Default::default()
            })
        }
    }

    fn manager(code: Option<&'static str>) -> (Arc<MemoryStore>, SettingsManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = SettingsManager::new(store.clone(), Arc::new(FixedSession(code)));
        (store, manager)
    }

    #[test]
    fn test_corrupt_blob_reads_as_defaults() {
        let (store, manager) = manager(Some("ICPL"));
        store.set(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(manager.get_settings(), default_settings(Some("ICPL")));

        store.set(SETTINGS_KEY, "[1, 2]").unwrap();
        assert!(manager.stored_overrides().is_empty());
    }

    #[test]
    fn test_update_preserves_unknown_keys() {
        let (store, manager) = manager(None);
        store
            .set(SETTINGS_KEY, r#"{"futureToggle": true, "showScore": false}"#)
            .unwrap();

        let settings = manager.update_setting(DisplayToggle::ShowMileage, false).unwrap();
        assert!(!settings.show_mileage);
        assert!(!settings.show_score);

        let stored = manager.stored_overrides();
        assert_eq!(stored.toggles.get("futureToggle"), Some(&true));
    }

    #[test]
    fn test_legend_update_seeds_from_defaults() {
        let (_, manager) = manager(Some("SGP"));
        let settings = manager.update_legend_setting("Priority", true).unwrap();
        assert!(settings.legend_visible("Priority"));
        assert!(settings.legend_visible("Recommendation"));

        let stored = manager.stored_overrides().legend.unwrap();
        assert_eq!(stored.get("Recommendation"), Some(&true));
        assert_eq!(stored.get("Compensate"), Some(&false));
    }

    #[test]
    fn test_unknown_factor_leaves_list_unchanged() {
        let (_, manager) = manager(None);
        let settings = manager.update_factor_score(999, false).unwrap();
        assert_eq!(settings.factor_scores, default_settings(None).factor_scores);
        assert!(manager.factor_score_by_id(999).is_none());
    }

    #[test]
    fn test_factor_missing_from_stored_list_is_added() {
        let (store, manager) = manager(None);
        store
            .set(SETTINGS_KEY, r#"{"factorScores": [{"factor_id": 17, "show": true}]}"#)
            .unwrap();

        manager.update_factor_score(13, false).unwrap();
        assert_eq!(manager.factor_score_by_id(13).map(|f| f.show), Some(false));
        assert_eq!(manager.stored_overrides().factor_scores.unwrap().len(), 2);
    }

    #[test]
    fn test_session_queries() {
        let (_, anonymous) = manager(None);
        assert_eq!(anonymous.current_service_code(), UNKNOWN_SERVICE_CODE);
        assert!(!anonymous.is_restricted());
        assert!(anonymous.can_modify_setting("showFactorScores"));
        assert_eq!(anonymous.enabled_factor_scores().len(), 11);

        let (_, restricted) = manager(Some("SGP"));
        assert!(restricted.is_restricted());
        assert!(!restricted.can_modify_setting("showFactorScores"));
        assert!(!restricted.can_modify_setting("factorScores.6"));
        assert!(restricted.can_modify_setting("showQueue"));
        assert!(restricted.enabled_factor_scores().is_empty());
        assert_eq!(restricted.available_legend_options().len(), 4);
    }
}
