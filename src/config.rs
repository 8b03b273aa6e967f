// SPDX-License-Identifier: GPL-3.0-only

//! User preferences
//!
//! Preferences live in a [`PreferenceStore`], a small synchronous key-value
//! store of JSON values. [`Config`] is the typed snapshot read from it.

use crate::constants::{app_info, keys};
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::EncodingQuality;
use crate::session::SelectionPolicy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Photo output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoOutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl PhotoOutputFormat {
    pub fn display_name(&self) -> &'static str {
        match self {
            PhotoOutputFormat::Jpeg => "JPEG",
            PhotoOutputFormat::Png => "PNG",
        }
    }
}

/// Where captured photos go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveLocation {
    /// The photo folder under the user's pictures directory
    #[default]
    Library,
    /// Ask with a save dialog every time
    Dialog,
}

/// Typed view of the stored preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera the user picked last
    pub selected_camera_id: Option<String>,
    /// Mirror preview and photos horizontally (selfie mode)
    pub mirrored: bool,
    pub photo_format: PhotoOutputFormat,
    pub jpeg_quality: EncodingQuality,
    pub save_location: SaveLocation,
    pub selection_policy: SelectionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selected_camera_id: None,
            mirrored: true, // Default to mirrored (selfie mode)
            photo_format: PhotoOutputFormat::default(),
            jpeg_quality: EncodingQuality::default(),
            save_location: SaveLocation::default(),
            selection_policy: SelectionPolicy::default(),
        }
    }
}

impl Config {
    /// Read every preference from `store`
    ///
    /// Missing keys take their default; keys holding unexpected values are
    /// logged and also take their default.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let defaults = Self::default();
        let config = Self {
            selected_camera_id: read(store, keys::SELECTED_CAMERA_ID).unwrap_or(None),
            mirrored: read(store, keys::MIRRORED).unwrap_or(defaults.mirrored),
            photo_format: read(store, keys::PHOTO_FORMAT).unwrap_or(defaults.photo_format),
            jpeg_quality: read(store, keys::JPEG_QUALITY).unwrap_or(defaults.jpeg_quality),
            save_location: read(store, keys::SAVE_LOCATION).unwrap_or(defaults.save_location),
            selection_policy: read(store, keys::SELECTION_POLICY)
                .unwrap_or(defaults.selection_policy),
        };
        debug!(?config, "Configuration loaded");
        config
    }

    /// Write every preference to `store`
    pub fn save_to(&self, store: &dyn PreferenceStore) -> AppResult<()> {
        match &self.selected_camera_id {
            Some(id) => store.set(keys::SELECTED_CAMERA_ID, Value::String(id.clone()))?,
            None => store.remove(keys::SELECTED_CAMERA_ID)?,
        }
        store.set(keys::MIRRORED, Value::Bool(self.mirrored))?;
        store.set(keys::PHOTO_FORMAT, serde_json::to_value(self.photo_format)?)?;
        store.set(keys::JPEG_QUALITY, serde_json::to_value(self.jpeg_quality)?)?;
        store.set(keys::SAVE_LOCATION, serde_json::to_value(self.save_location)?)?;
        store.set(keys::SELECTION_POLICY, serde_json::to_value(&self.selection_policy)?)?;
        Ok(())
    }
}

/// Synchronous key-value persistence
///
/// Writes are expected to be effectively immediate; callers do not queue
/// them.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> AppResult<()>;

    fn remove(&self, key: &str) -> AppResult<()>;
}

/// Read and deserialize one key
///
/// Returns None when the key is missing or holds something else.
pub fn read<T: DeserializeOwned>(store: &dyn PreferenceStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key, error = %e, "Ignoring invalid preference value");
            None
        }
    }
}

fn lock(map: &Mutex<Map<String, Value>>) -> MutexGuard<'_, Map<String, Value>> {
    map.lock().unwrap_or_else(|e| e.into_inner())
}

/// Preferences persisted as one JSON object on disk
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonPreferenceStore {
    /// Default location: `<config dir>/mirror/preferences.json`
    pub fn default_path() -> AppResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(app_info::APP_NAME).join("preferences.json"))
            .ok_or_else(|| AppError::Config("No configuration directory for this user".into()))
    }

    /// Open the store at the default location
    pub fn open_default() -> AppResult<Self> {
        Self::open(Self::default_path()?)
    }

    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let parsed: Value = serde_json::from_str(&contents)?;
            match parsed {
                Value::Object(map) => {
                    info!(path = %path.display(), keys = map.len(), "Loaded preferences");
                    map
                }
                _ => {
                    return Err(AppError::Config(format!(
                        "{} does not hold a JSON object",
                        path.display()
                    )));
                }
            }
        } else {
            info!(path = %path.display(), "No preferences found, using defaults");
            Map::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &Map<String, Value>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), "Preferences written");
        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

/// Preferences held in memory only
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> AppResult<()> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}
