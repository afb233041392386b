//! Application settings
//!
//! Loaded from `speleograph.toml`. Every section and key is optional; missing
//! ones take their default value.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::series::DEFAULT_HISTORY_CAPACITY;
use crate::transform::DEFAULT_MULTIPLIER;

pub const DEFAULT_SETTINGS_FILE: &str = "speleograph.toml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub history: HistorySettings,
    pub correlation: CorrelationSettings,
    pub water_height: WaterHeightSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Modifications kept per series
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    /// Maximum distance between two matched items, e.g. "3m" or "90s"
    #[serde(with = "humantime_duration")]
    pub tolerance: StdDuration,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            tolerance: StdDuration::from_secs(180),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterHeightSettings {
    /// hPa to centimetres of water
    pub multiplier: f64,
}

impl Default for WaterHeightSettings {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl Settings {
    /// Parse settings from `path`
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml(&contents).map_err(|message| SettingsError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Like [`Settings::load_from_path`], falling back to defaults when the
    /// file is missing or invalid
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_path(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io { .. }) => {
                info!("No settings file at {}, using defaults", path.as_ref().display());
                Self::default()
            }
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Correlation tolerance as a chrono duration
    pub fn tolerance(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.correlation.tolerance)
            .unwrap_or_else(|_| crate::transform::default_tolerance())
    }
}

/// Durations written the humantime way ("3m", "1h 30m")
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.history.capacity, 50);
        assert_eq!(settings.tolerance(), chrono::Duration::minutes(3));
        assert!((settings.water_height.multiplier - 1.02).abs() < 1e-12);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml("[correlation]\ntolerance = \"90s\"\n").unwrap();
        assert_eq!(settings.tolerance(), chrono::Duration::seconds(90));
        assert_eq!(settings.history.capacity, 50);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut settings = Settings::default();
        settings.history.capacity = 10;
        settings.correlation.tolerance = StdDuration::from_secs(3600);
        let parsed = Settings::from_toml(&settings.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[history]\ncapacity = 5\n[water_height]\nmultiplier = 1.0").unwrap();
        let settings = Settings::load_from_path(file.path()).unwrap();
        assert_eq!(settings.history.capacity, 5);
        assert_eq!(settings.water_height.multiplier, 1.0);
    }

    #[test]
    fn test_invalid_file_errors_and_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[correlation]\ntolerance = \"soon\"").unwrap();
        assert!(matches!(
            Settings::load_from_path(file.path()),
            Err(SettingsError::Parse { .. })
        ));
        assert_eq!(Settings::load_or_default(file.path()), Settings::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load_or_default("/nonexistent/speleograph.toml");
        assert_eq!(settings, Settings::default());
    }
}
