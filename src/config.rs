// AeroShare Configuration Module
// Persistent operator settings: backend connection and share-link defaults

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::providers::ConnectionConfig;

const CONFIG_FILENAME: &str = "config.json";

/// Directory entries per listing page
pub const DEFAULT_PAGE_SIZE: u32 = 30;
/// Page size used for "load all" listings; the backend serves the whole
/// directory in one response at this size
pub const LOAD_ALL_PAGE_SIZE: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Share-link defaults set by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSettings {
    /// Page that opens share links (e.g. https://share.example.com/view)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Pre-shared password that passwordless links may embed
    #[serde(default)]
    pub default_password: Option<String>,
    /// Embed the default password in links built with it.
    /// Convenience only: anyone holding such a link can open it.
    #[serde(default)]
    pub passwordless_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend to browse and share from
    #[serde(default)]
    pub connection: Option<ConnectionConfig>,
    #[serde(default)]
    pub share: ShareSettings,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_load_all_page_size")]
    pub load_all_page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_load_all_page_size() -> u32 {
    LOAD_ALL_PAGE_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connection: None,
            share: ShareSettings::default(),
            page_size: DEFAULT_PAGE_SIZE,
            load_all_page_size: LOAD_ALL_PAGE_SIZE,
        }
    }
}

/// Directory holding all persisted AeroShare state
pub fn config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    base.join("aeroshare")
}

pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILENAME)
}

// ============ Permission Hardening ============

/// Restrict `path` to its owner: 0o600 for files, 0o700 for directories
pub fn ensure_secure_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if path.is_dir() { 0o700 } else { 0o600 };
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

/// Write a file holding secrets. A parent directory created here is made
/// owner-only as well; an existing one is left alone.
pub(crate) fn write_private(path: &Path, content: &[u8]) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            ensure_secure_permissions(parent)?;
        }
    }
    fs::write(path, content)?;
    ensure_secure_permissions(path)?;
    Ok(())
}

impl AppConfig {
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load from `path`, falling back to defaults if missing or corrupt
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        write_private(path, content.as_bytes())?;
        tracing::info!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(conn) = &self.connection {
            conn.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("Page size must be at least 1".to_string()));
        }
        if self.load_all_page_size < self.page_size {
            return Err(ConfigError::Invalid(
                "Load-all page size must not be smaller than the page size".to_string(),
            ));
        }
        if self.share.passwordless_enabled
            && self.share.default_password.as_deref().unwrap_or("").is_empty()
        {
            return Err(ConfigError::Invalid(
                "Passwordless links need a default share password".to_string(),
            ));
        }
        if let Some(base) = &self.share.base_url {
            url::Url::parse(base)
                .map_err(|e| ConfigError::Invalid(format!("Invalid share base URL: {}", e)))?;
        }
        Ok(())
    }
}
