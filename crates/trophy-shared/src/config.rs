//! Trophy Case configuration.
//!
//! Configuration lives in `$XDG_CONFIG_HOME/trophy/config.toml` unless
//! `$TROPHY_CONFIG` or an explicit path says otherwise. Every field has a
//! default so a missing or partial file is fine.

use crate::error::Result;
use crate::persistence::DEFAULT_STORAGE_KEY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "TROPHY_CONFIG";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the progression blob
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Key the blob is stored under
    #[serde(default = "default_storage_key")]
    pub key: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trophy")
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            key: default_storage_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSettings {
    /// Rolling key buffer length per detector (valid: 8-256)
    #[serde(default = "default_buffer_len")]
    pub buffer_len: usize,
}

fn default_buffer_len() -> usize {
    30
}

impl TriggerSettings {
    pub fn effective_buffer_len(&self) -> usize {
        self.buffer_len.clamp(8, 256)
    }
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self { buffer_len: default_buffer_len() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Delay before a fresh unlock is announced
    #[serde(default)]
    pub initial_delay_ms: u64,

    /// Minimum gap between two announcements
    #[serde(default = "default_spacing")]
    pub spacing_ms: u64,

    /// Delay of the completionist announcement after the one that caused it
    #[serde(default = "default_completionist_delay")]
    pub completionist_delay_ms: u64,
}

fn default_spacing() -> u64 {
    4000
}

fn default_completionist_delay() -> u64 {
    6000
}

impl NotificationSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.spacing_ms)
    }

    pub fn completionist_delay(&self) -> Duration {
        Duration::from_millis(self.completionist_delay_ms)
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 0,
            spacing_ms: default_spacing(),
            completionist_delay_ms: default_completionist_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrophyConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub triggers: TriggerSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl TrophyConfig {
    /// Parse a config file; errors are returned to the caller
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from the given path, `$TROPHY_CONFIG`, or the default location.
    /// Unreadable files fall back to defaults with a warning.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(config_path);

        if !path.exists() {
            return Self::default();
        }
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Default config file path
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trophy")
        .join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = TrophyConfig::default();
        assert_eq!(config.storage.key, "portfolio-achievements");
        assert_eq!(config.triggers.buffer_len, 30);
        assert_eq!(config.notifications.completionist_delay(), Duration::from_secs(6));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: TrophyConfig = toml::from_str(
            r#"
            [notifications]
            spacing_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.notifications.spacing_ms, 1500);
        assert_eq!(config.notifications.completionist_delay_ms, 6000);
        assert_eq!(config.triggers.buffer_len, 30);
    }

    #[test]
    fn test_buffer_len_clamped() {
        let settings = TriggerSettings { buffer_len: 2 };
        assert_eq!(settings.effective_buffer_len(), 8);
        let settings = TriggerSettings { buffer_len: 10_000 };
        assert_eq!(settings.effective_buffer_len(), 256);
    }

    #[test]
    fn test_load_explicit_and_invalid() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.toml");
        fs::write(&good, "[storage]\nkey = \"custom\"\n").unwrap();
        assert_eq!(TrophyConfig::load(Some(&good)).storage.key, "custom");

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[storage\nkey = ").unwrap();
        assert!(TrophyConfig::from_file(&bad).is_err());
        assert_eq!(TrophyConfig::load(Some(&bad)), TrophyConfig::default());
    }
}
