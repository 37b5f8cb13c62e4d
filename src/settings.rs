//! User settings and their local cache.
//!
//! Settings persist authoritatively in the progress store's user_state
//! row. A redundant copy is kept on disk at
//! `{working_dir}/.pyzone/settings.json` so a fresh session can render
//! with the learner's theme before the store answers; on load the store's
//! copy wins any conflict.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Editor theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Editor font size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// Per-user settings: a closed struct with exactly the supported options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, rename = "fontSize")]
    pub font_size: FontSize,
}

/// Best-effort on-disk cache of per-user settings.
///
/// Every operation is non-fatal: cache failures are logged and the caller
/// carries on with whatever it already has.
#[derive(Debug)]
pub struct SettingsCache {
    entries: RwLock<HashMap<Uuid, UserSettings>>,
    storage_path: PathBuf,
}

impl SettingsCache {
    /// Create a new cache, loading from disk if a file is present.
    pub fn new(working_dir: &PathBuf) -> Self {
        let storage_path = working_dir.join(".pyzone/settings.json");

        let entries = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(map) => {
                    tracing::debug!("Loaded settings cache from {}", storage_path.display());
                    map
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load settings cache from {}: {}, starting empty",
                        storage_path.display(),
                        e
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Self {
            entries: RwLock::new(entries),
            storage_path,
        }
    }

    fn load_from_path(path: &PathBuf) -> Result<HashMap<Uuid, UserSettings>, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    async fn save_to_disk(&self) -> Result<(), std::io::Error> {
        let entries = self.entries.read().await;

        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&*entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(&self.storage_path, contents)?;
        Ok(())
    }

    /// Get the cached settings for a user, if any.
    pub async fn get(&self, user: Uuid) -> Option<UserSettings> {
        self.entries.read().await.get(&user).cloned()
    }

    /// Update the cached settings for a user and persist, best-effort.
    pub async fn put(&self, user: Uuid, settings: UserSettings) {
        {
            let mut entries = self.entries.write().await;
            entries.insert(user, settings);
        }
        if let Err(e) = self.save_to_disk().await {
            tracing::warn!("Failed to persist settings cache: {}", e);
        }
    }
}

/// Shared settings cache wrapped in Arc for concurrent access.
pub type SharedSettingsCache = Arc<SettingsCache>;
