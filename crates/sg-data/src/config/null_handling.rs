//! Missing-value handling for instrument cells

use serde::{Deserialize, Serialize};

/// Cell contents that mean "no datum"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Patterns to treat as null
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                String::new(),
                "-".to_string(),
                "N/A".to_string(),
                "NaN".to_string(),
                "null".to_string(),
                // Weather station sentinels
                "-9999".to_string(),
                "-9999.0".to_string(),
                "-999".to_string(),
            ],
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    /// Only blank cells are null; sentinel numbers like `-999` are data
    pub fn empty_cells_only() -> Self {
        Self {
            patterns: vec![String::new()],
            ..Self::default()
        }
    }

    /// Check if a value should be treated as null
    pub fn is_null(&self, value: &str) -> bool {
        let test_value = if self.trim_whitespace {
            value.trim()
        } else {
            value
        };

        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                test_value == pattern
            } else {
                test_value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// Number held by a cell.
    ///
    /// `None` for null cells and for cells that are not numbers. A decimal
    /// comma is accepted.
    pub fn parse_value(&self, value: &str) -> Option<f64> {
        if self.is_null(value) {
            return None;
        }
        let text = value.trim();
        text.parse::<f64>()
            .or_else(|_| text.replace(',', ".").parse::<f64>())
            .ok()
            .filter(|v| v.is_finite())
    }

    /// Add a null pattern
    pub fn add_pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_null() {
        let config = NullConfig::default();
        assert!(config.is_null(" -9999 "));
        assert!(config.is_null("n/a"));
        assert!(config.is_null(""));
        assert!(!config.is_null("0"));
    }

    #[test]
    fn test_parse_value() {
        let config = NullConfig::default();
        assert_eq!(config.parse_value("1013.25"), Some(1013.25));
        assert_eq!(config.parse_value(" 12,5 "), Some(12.5));
        assert_eq!(config.parse_value("-9999"), None);
        assert_eq!(config.parse_value("Logged"), None);
        assert_eq!(config.parse_value("inf"), None);
    }

    #[test]
    fn test_empty_cells_only() {
        let config = NullConfig::empty_cells_only();
        assert!(config.is_null("  "));
        assert_eq!(config.parse_value("-999"), Some(-999.0));
        assert_eq!(config.parse_value("-9999"), Some(-9999.0));
        assert_eq!(config.parse_value("N/A"), None);
    }

    #[test]
    fn test_case_sensitive_patterns() {
        let mut config = NullConfig {
            case_sensitive: true,
            ..NullConfig::default()
        };
        config.add_pattern("MISSING".to_string());
        assert!(config.is_null("MISSING"));
        assert!(!config.is_null("missing"));
    }
}
