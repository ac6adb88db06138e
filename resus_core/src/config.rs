//! Configuration file support for Resus.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/resus/config.toml`.

use crate::engine::{ProtocolSettings, DEFAULT_SNOOZE_SECONDS, DEFAULT_UNDO_WINDOW_SECONDS};
use crate::audio::DEFAULT_MIN_GAP_MS;
use crate::types::{AdrenalineFrequency, Mode};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Protocol timing parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub default_mode: Mode,

    #[serde(default = "default_adrenaline_frequency")]
    pub adrenaline_frequency_minutes: u8,

    #[serde(default = "default_snooze_seconds")]
    pub snooze_seconds: u64,

    #[serde(default = "default_undo_window_seconds")]
    pub undo_window_seconds: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            default_mode: Mode::default(),
            adrenaline_frequency_minutes: default_adrenaline_frequency(),
            snooze_seconds: default_snooze_seconds(),
            undo_window_seconds: default_undo_window_seconds(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Silence between the end of one cue and the start of the next
    #[serde(default = "default_min_gap_ms")]
    pub min_gap_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            min_gap_ms: default_min_gap_ms(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("resus")
}

fn default_adrenaline_frequency() -> u8 {
    AdrenalineFrequency::default().minutes()
}

fn default_snooze_seconds() -> u64 {
    DEFAULT_SNOOZE_SECONDS
}

fn default_undo_window_seconds() -> u64 {
    DEFAULT_UNDO_WINDOW_SECONDS
}

fn default_min_gap_ms() -> u64 {
    DEFAULT_MIN_GAP_MS
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("resus").join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        let minutes = self.protocol.adrenaline_frequency_minutes;
        if AdrenalineFrequency::try_from(minutes).is_err() {
            return Err(Error::Config(format!(
                "adrenaline_frequency_minutes must be one of {:?}, got {}",
                AdrenalineFrequency::ALLOWED,
                minutes
            )));
        }
        if self.protocol.snooze_seconds == 0 {
            return Err(Error::Config("snooze_seconds must be positive".into()));
        }
        Ok(())
    }

    /// Protocol parameters for a new engine
    pub fn protocol_settings(&self) -> Result<ProtocolSettings> {
        let adrenaline_frequency =
            AdrenalineFrequency::try_from(self.protocol.adrenaline_frequency_minutes)
                .map_err(|e| Error::Config(e.to_string()))?;
        Ok(ProtocolSettings {
            default_mode: self.protocol.default_mode,
            adrenaline_frequency,
            snooze_seconds: self.protocol.snooze_seconds,
            undo_window_seconds: self.protocol.undo_window_seconds,
            audio_gap_ms: self.audio.min_gap_ms,
        })
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.protocol.default_mode, Mode::Coach);
        assert_eq!(config.protocol.adrenaline_frequency_minutes, 4);
        assert_eq!(config.protocol.snooze_seconds, 90);
        assert_eq!(config.protocol.undo_window_seconds, 10);
        assert_eq!(config.audio.min_gap_ms, 2000);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.data.data_dir.ends_with("resus"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.protocol.adrenaline_frequency_minutes,
            parsed.protocol.adrenaline_frequency_minutes
        );
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[protocol]
default_mode = "track"
adrenaline_frequency_minutes = 3

[logging]
format = "pretty"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.protocol.default_mode, Mode::Track);
        assert_eq!(config.protocol.snooze_seconds, 90); // default
        assert_eq!(config.logging.level, "info");

        let settings = config.protocol_settings().unwrap();
        assert_eq!(settings.adrenaline_frequency.interval_seconds(), 180);
        assert_eq!(settings.default_mode, Mode::Track);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.protocol.adrenaline_frequency_minutes = 6;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(config.protocol_settings().is_err());

        let mut config = Config::default();
        config.protocol.snooze_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[protocol]\nadrenaline_frequency_minutes = 2\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        Config::default().save_to(&path).unwrap();
        assert!(Config::load_from(&path).is_ok());
    }
}
