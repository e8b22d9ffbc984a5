//! Persistent key-value store for settings and session data
//!
//! Each key maps to one JSON document. The file-backed store keeps one
//! `<key>.json` file per key inside the store directory.

pub mod memory;

pub use memory::MemoryStore;

use queueboard_types::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;

/// Key under which user display-setting overrides are persisted
pub const SETTINGS_KEY: &str = "atss_settings";

/// Key under which the authenticated session is persisted
pub const AUTH_KEY: &str = "atss_auth";

/// Durable get/set of JSON documents by key
pub trait KeyValueStore: Send + Sync {
    /// Raw stored document, `None` when the key was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the document stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the key; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and deserialize a document. Unparsable documents read as `None`.
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    Ok(store
        .get(key)?
        .and_then(|raw| serde_json::from_str(&raw).ok()))
}

/// Serialize and store a document, pretty-printed
pub fn set_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    store.set(key, &content)
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()).into())
    }
}

/// File-backed store, one JSON file per key
pub struct FileStore {
    store_dir: PathBuf,
}

impl FileStore {
    /// Create or open a store directory
    pub fn open(store_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&store_dir)?;
        Ok(Self { store_dir })
    }

    pub fn store_dir(&self) -> &PathBuf {
        &self.store_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.store_dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;

        // Write to a sibling file first so a crash never leaves half a document
        let tmp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &path).map_err(|e| {
            StoreError::IoError(format!("Failed to replace {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
