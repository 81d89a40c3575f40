// Configuration management module
// Handles loading, saving, and validating configuration

use crate::broker::BrokerOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted TTL, timeout or sweep period, in seconds (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a now playing record survives without a new update, in seconds
    pub now_playing_ttl_secs: u64,

    /// Upper bound for each scrobbler call during dispatch, in seconds
    pub dispatch_timeout_secs: u64,

    /// How often expired now playing records are swept from memory, in seconds
    pub sweep_interval_secs: u64,

    /// Forward completed plays to scrobblers.
    /// While off, submitting a play reports "not implemented".
    pub submit_dispatch: bool,

    /// Registered scrobblers that should not receive any events
    pub disabled_scrobblers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            now_playing_ttl_secs: 60 * 60,
            dispatch_timeout_secs: 5,
            sweep_interval_secs: 60,
            submit_dispatch: false,
            disabled_scrobblers: Vec::new(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?;

        Ok(config_dir.join("nowplaying_broker.toml"))
    }

    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            log::info!("Config file not found, creating default at {:?}", config_path);
            let default_config = Self::default();
            default_config.save_to(config_path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(config_path, content)
            .context("Failed to write config file")?;

        log::info!("Config saved to {:?}", config_path);

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.now_playing_ttl_secs == 0 {
            anyhow::bail!("now_playing_ttl_secs must be greater than 0");
        }

        if self.dispatch_timeout_secs == 0 {
            anyhow::bail!("dispatch_timeout_secs must be greater than 0");
        }

        if self.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be greater than 0");
        }

        for (key, value) in [
            ("now_playing_ttl_secs", self.now_playing_ttl_secs),
            ("dispatch_timeout_secs", self.dispatch_timeout_secs),
            ("sweep_interval_secs", self.sweep_interval_secs),
        ] {
            if value > MAX_DURATION_SECS {
                anyhow::bail!(
                    "{} must be at most {} (one year), got {}",
                    key,
                    MAX_DURATION_SECS,
                    value
                );
            }
        }

        // A dispatch outliving the record it announces makes no sense
        if self.dispatch_timeout_secs >= self.now_playing_ttl_secs {
            anyhow::bail!(
                "dispatch_timeout_secs ({}) must be shorter than now_playing_ttl_secs ({})",
                self.dispatch_timeout_secs,
                self.now_playing_ttl_secs
            );
        }

        if self.disabled_scrobblers.iter().any(|name| name.trim().is_empty()) {
            log::warn!("disabled_scrobblers contains a blank name, it will match nothing");
        }

        if self.submit_dispatch {
            log::warn!("submit_dispatch is enabled, completed plays will be sent to scrobblers");
        }

        Ok(())
    }

    /// Broker settings derived from this configuration
    pub fn broker_options(&self) -> BrokerOptions {
        BrokerOptions {
            ttl: ttl_from_secs(self.now_playing_ttl_secs),
            dispatch_timeout: Duration::from_secs(self.dispatch_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            submit_dispatch: self.submit_dispatch,
            disabled: self.disabled_scrobblers.iter().cloned().collect(),
        }
    }
}

/// Out-of-range values saturate instead of wrapping
fn ttl_from_secs(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let options = config.broker_options();
        assert_eq!(options.ttl, chrono::Duration::minutes(60));
        assert_eq!(options.dispatch_timeout, Duration::from_secs(5));
        assert!(!options.submit_dispatch);
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("broker.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broker.toml");

        let config = Config {
            dispatch_timeout_secs: 2,
            submit_dispatch: true,
            disabled_scrobblers: vec!["lastfm".to_string()],
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
        assert!(reloaded.broker_options().disabled.contains("lastfm"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broker.toml");
        fs::write(&path, "dispatch_timeout_secs = 10\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.dispatch_timeout_secs, 10);
        assert_eq!(config.now_playing_ttl_secs, 3600);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_ttl = Config {
            now_playing_ttl_secs: 0,
            ..Config::default()
        };
        assert!(zero_ttl.validate().is_err());

        let zero_timeout = Config {
            dispatch_timeout_secs: 0,
            ..Config::default()
        };
        assert!(zero_timeout.validate().is_err());

        let slow_dispatch = Config {
            now_playing_ttl_secs: 5,
            dispatch_timeout_secs: 5,
            ..Config::default()
        };
        assert!(slow_dispatch.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_huge_durations() {
        let huge_ttl = Config {
            now_playing_ttl_secs: u64::MAX,
            ..Config::default()
        };
        assert!(huge_ttl.validate().is_err());

        let overflowing_ttl = Config {
            now_playing_ttl_secs: 1_000_000_000_000_000,
            ..Config::default()
        };
        assert!(overflowing_ttl.validate().is_err());

        let huge_timeout = Config {
            dispatch_timeout_secs: MAX_DURATION_SECS + 1,
            now_playing_ttl_secs: MAX_DURATION_SECS,
            ..Config::default()
        };
        assert!(huge_timeout.validate().is_err());

        let huge_sweep = Config {
            sweep_interval_secs: MAX_DURATION_SECS + 1,
            ..Config::default()
        };
        assert!(huge_sweep.validate().is_err());

        let one_year = Config {
            now_playing_ttl_secs: MAX_DURATION_SECS,
            ..Config::default()
        };
        assert!(one_year.validate().is_ok());
    }

    #[test]
    fn test_ttl_conversion_saturates() {
        assert_eq!(ttl_from_secs(3600), chrono::Duration::hours(1));
        assert_eq!(ttl_from_secs(u64::MAX), chrono::Duration::MAX);
        assert_eq!(ttl_from_secs(i64::MAX as u64), chrono::Duration::MAX);

        let unchecked = Config {
            now_playing_ttl_secs: u64::MAX,
            ..Config::default()
        };
        assert!(unchecked.broker_options().ttl > chrono::Duration::zero());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broker.toml");
        fs::write(&path, "dispatch_timeout_secs = \"soon\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
