//! # Configuration Management Module
//!
//! Persistent application settings stored in platform-appropriate locations.
//! Handles loading, saving, and providing defaults for configuration options.
//!
//! ## Settings
//! - `stale_after_secs`: How long a device may stay silent before it is dropped
//! - `periodic_sweep` / `sweep_interval_secs`: Timer-driven eviction in the scan manager
//! - `location_enabled` / `location_interval_secs` / `location_fastest_secs`: Location relay
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/geoblip/config.toml
//! - Linux: ~/.config/geoblip/config.toml
//! - Windows: %APPDATA%\geoblip\config.toml
//!
//! ## Why TOML
//! Human-readable format allows manual editing if needed. Serde provides
//! automatic serialization/deserialization.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Staleness window for the peer registry, in seconds (source app used 10s)
    pub stale_after_secs: u64,
    /// Run a timer-driven sweep in the scan manager so the device list stays
    /// live when no new advertisements arrive. `false` restores the source
    /// app's behavior of only evicting on arrival.
    pub periodic_sweep: bool,
    /// Sweep tick period when `periodic_sweep` is on, in seconds
    pub sweep_interval_secs: u64,
    /// Run the location relay alongside the scanner
    pub location_enabled: bool,
    /// Emission period of the location source, in seconds
    pub location_interval_secs: u64,
    /// Minimum spacing between forwarded fixes, in seconds
    pub location_fastest_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stale_after_secs: 10,
            periodic_sweep: true,
            sweep_interval_secs: 1,
            location_enabled: true,
            location_interval_secs: 10,
            location_fastest_secs: 5,
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("geoblip").join("config.toml")
    }

    /// Staleness window in milliseconds, the unit the registry works in.
    pub fn stale_after_ms(&self) -> i64 {
        self.stale_after_secs as i64 * 1_000
    }

    /// Load config from the platform config dir, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, or create default if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, create default
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to the platform config dir
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.stale_after_secs, 10);
        assert_eq!(config.periodic_sweep, true);
        assert_eq!(config.sweep_interval_secs, 1);
        assert_eq!(config.location_enabled, true);
        assert_eq!(config.location_interval_secs, 10);
        assert_eq!(config.location_fastest_secs, 5);
    }

    #[test]
    fn test_stale_after_ms_conversion() {
        let config = Config::default();
        assert_eq!(config.stale_after_ms(), 10_000);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            stale_after_secs: 30,
            periodic_sweep: false,
            ..Config::default()
        };

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("stale_after_secs = 30"));
        assert!(toml_str.contains("periodic_sweep = false"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            stale_after_secs = 15
            periodic_sweep = true
            sweep_interval_secs = 2
            location_enabled = false
            location_interval_secs = 20
            location_fastest_secs = 10
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.stale_after_secs, 15);
        assert_eq!(config.sweep_interval_secs, 2);
        assert_eq!(config.location_enabled, false);
    }

    #[test]
    fn test_load_creates_default_when_missing() {
        let dir = tempfile::tempdir().expect("Failed to create tempdir");
        let path = dir.path().join("geoblip").join("config.toml");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config.stale_after_secs, Config::default().stale_after_secs);
        // load_from saves the defaults it created
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create tempdir");
        let path = dir.path().join("config.toml");

        let config = Config {
            stale_after_secs: 42,
            location_enabled: false,
            ..Config::default()
        };
        config.save_to(&path).expect("Failed to save config");

        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded.stale_after_secs, 42);
        assert_eq!(loaded.location_enabled, false);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().expect("Failed to create tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "stale_after_secs = \"ten\"").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseFailed(_))
        ));
    }
}
