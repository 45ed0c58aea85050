// AeroShare Directory Password Store
// Remembers the last password that unlocked each protected directory listing.
// Convenience cache only: the backend re-checks authorization on every request.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{write_private, ConfigError};
use crate::providers::normalize_path;

const STORE_FILENAME: &str = "dir_passwords.json";

/// Map from normalized absolute directory path to its last working password.
///
/// No eviction and no TTL. Entries are written only after a listing with that
/// password succeeded, and a later failed attempt never removes one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryPasswordStore {
    entries: BTreeMap<String, String>,
}

impl DirectoryPasswordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(&normalize_path(path)).map(String::as_str)
    }

    /// Overwrite the password for `path`. Empty passwords are not stored.
    pub fn set(&mut self, path: &str, password: &str) {
        if password.is_empty() {
            return;
        }
        self.entries.insert(normalize_path(path), password.to_string());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Directories with a cached password, sorted
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn default_path() -> PathBuf {
        crate::config::config_dir().join(STORE_FILENAME)
    }

    /// Load from disk. A missing or unreadable file yields an empty store.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(store) => store,
                Err(e) => {
                    tracing::warn!("Failed to parse directory password store: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read directory password store: {}", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        write_private(path, content.as_bytes())?;
        tracing::debug!("Directory password store saved ({} entries)", self.len());
        Ok(())
    }
}
