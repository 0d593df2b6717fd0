//! Dataset entry configuration.
//!
//! Entries are plain parsed structs; the catalog never resolves
//! datasets through dynamic lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// On-disk representation format for a dataset entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// JSON-serialized value.
    #[default]
    Json,
    /// Plain UTF-8 text; the value must be a string.
    Text,
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl DatasetFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "txt",
        }
    }
}

/// Configuration for a single catalog entry.
///
/// Loaded from configuration at process start and read-only during a
/// run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Where the dataset is read from and written to. For versioned
    /// entries this is a directory holding one subdirectory per
    /// version; otherwise it is the file path itself.
    pub location: PathBuf,
    /// How values are (de)serialized.
    #[serde(default)]
    pub format: DatasetFormat,
    /// Whether writes create a new timestamped copy instead of
    /// overwriting.
    #[serde(default)]
    pub versioned: bool,
}

impl DatasetConfig {
    /// Creates a non-versioned JSON entry at `location`.
    #[must_use]
    pub fn json(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            format: DatasetFormat::Json,
            versioned: false,
        }
    }

    /// Creates a non-versioned text entry at `location`.
    #[must_use]
    pub fn text(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            format: DatasetFormat::Text,
            versioned: false,
        }
    }

    /// Marks the entry as versioned.
    #[must_use]
    pub const fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let config: DatasetConfig = serde_json::from_str(
            r#"{"location": "data/ratings.json", "format": "json", "versioned": true}"#,
        )
        .unwrap();

        assert_eq!(config.format, DatasetFormat::Json);
        assert!(config.versioned);
    }

    #[test]
    fn test_config_defaults() {
        let config: DatasetConfig =
            serde_json::from_str(r#"{"location": "data/notes.txt"}"#).unwrap();

        assert_eq!(config.format, DatasetFormat::Json);
        assert!(!config.versioned);
    }

    #[test]
    fn test_format_display_and_extension() {
        assert_eq!(DatasetFormat::Json.to_string(), "json");
        assert_eq!(DatasetFormat::Text.extension(), "txt");
    }
}
