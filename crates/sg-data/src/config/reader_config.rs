//! Settings shared by the instrument readers

use serde::{Deserialize, Serialize};

use super::null_handling::NullConfig;

/// Reader settings, read from the `[readers]` table of `speleograph.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Placed between a date cell and a time cell before parsing them together
    pub date_join: String,

    /// Hobo date patterns, tried in order
    pub hobo_date_formats: Vec<String>,

    /// Rain volume of one gauge tip, in millimetres
    pub hobo_rain_tip_mm: f64,

    /// Start of the device id field of Reefnet records
    pub reefnet_device_prefix: String,

    /// Null handling configuration
    pub null: NullConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            date_join: " ".to_string(),
            hobo_date_formats: vec![
                "dd/MM/yy HH:mm:ss".to_string(),
                "MM/dd/yy hh:mm:ss a".to_string(),
            ],
            hobo_rain_tip_mm: 0.2,
            reefnet_device_prefix: "0".to_string(),
            null: NullConfig::default(),
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    readers: ReaderConfig,
}

impl ReaderConfig {
    /// Extract the `[readers]` table of a settings file; other tables are ignored
    pub fn from_toml(contents: &str) -> Result<Self, String> {
        toml::from_str::<ConfigFile>(contents)
            .map(|file| file.readers)
            .map_err(|e| e.to_string())
    }

    /// Join a date cell and a time cell
    pub fn join(&self, date: &str, time: &str) -> String {
        format!("{}{}{}", date.trim(), self.date_join, time.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.date_join, " ");
        assert_eq!(config.hobo_date_formats[0], "dd/MM/yy HH:mm:ss");
        assert!((config.hobo_rain_tip_mm - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_readers_table() {
        let contents = "[history]\ncapacity = 3\n\n[readers]\nhobo_rain_tip_mm = 0.5\ndate_join = \"T\"\n";
        let config = ReaderConfig::from_toml(contents).unwrap();
        assert_eq!(config.hobo_rain_tip_mm, 0.5);
        assert_eq!(config.join("2020-01-01", "10:00"), "2020-01-01T10:00");
        assert_eq!(config.hobo_date_formats.len(), 2);
    }

    #[test]
    fn test_missing_table_uses_defaults() {
        assert_eq!(ReaderConfig::from_toml("").unwrap(), ReaderConfig::default());
    }
}
