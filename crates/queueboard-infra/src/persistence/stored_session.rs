//! Session provider backed by the key-value store
//!
//! The session is written by whatever performed the login; this side only
//! reads it, replaces it, or clears it.

use std::sync::Arc;

use queueboard_domain::SessionProvider;
use queueboard_store::{get_json, set_json, KeyValueStore, AUTH_KEY, SETTINGS_KEY};
use queueboard_types::{AuthData, Result};
use tracing::warn;

/// Reads `atss_auth` from the store on every call so that a session written
/// by another process is picked up without a restart
#[derive(Clone)]
pub struct StoredSession {
    store: Arc<dyn KeyValueStore>,
}

impl StoredSession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Replace the stored session
    pub fn save(&self, auth: &AuthData) -> Result<()> {
        set_json(self.store.as_ref(), AUTH_KEY, &auth.clone().normalized())
    }

    /// Forget the session and the user's display settings
    pub fn clear(&self) -> Result<()> {
        self.store.remove(AUTH_KEY)?;
        self.store.remove(SETTINGS_KEY)
    }
}

impl SessionProvider for StoredSession {
    fn auth_data(&self) -> Option<AuthData> {
        match get_json::<AuthData>(self.store.as_ref(), AUTH_KEY) {
            Ok(auth) => auth.map(AuthData::normalized),
            Err(e) => {
                warn!("Failed to read session: {}", e);
                None
            }
        }
    }
}
