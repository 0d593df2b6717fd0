//! Filesystem backing store for catalog entries.
//!
//! Versioned entries write `<location>/<version>/data.<ext>` where the
//! version is a UTC timestamp; loads resolve the lexically greatest
//! version, which is also the most recent.

use super::config::{DatasetConfig, DatasetFormat};
use crate::errors::DatasetError;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Generates a new version string from the current UTC time.
///
/// Lexical order of these strings matches chronological order.
#[must_use]
pub fn generate_version() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H.%M.%S%.3fZ")
        .to_string()
}

/// Loads a dataset value from its backing entry.
///
/// # Errors
///
/// Returns a `DatasetError` on IO failure, deserialization failure, or
/// when a versioned entry has no versions yet.
pub fn load(name: &str, config: &DatasetConfig) -> Result<Value, DatasetError> {
    let path = read_path(name, config)?;

    let raw = fs::read_to_string(&path).map_err(|e| DatasetError::load(name, e))?;

    match config.format {
        DatasetFormat::Json => {
            serde_json::from_str(&raw).map_err(|e| DatasetError::serde(name, e))
        }
        DatasetFormat::Text => Ok(Value::String(raw)),
    }
}

/// Saves a dataset value through its backing entry and returns the
/// path written.
///
/// # Errors
///
/// Returns a `DatasetError` on serialization or IO failure.
pub fn save(name: &str, config: &DatasetConfig, value: &Value) -> Result<PathBuf, DatasetError> {
    let path = write_path(config);

    let raw = match config.format {
        DatasetFormat::Json => {
            serde_json::to_string_pretty(value).map_err(|e| DatasetError::serde(name, e))?
        }
        DatasetFormat::Text => value
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| {
                DatasetError::write(
                    name,
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        "text format requires a string value",
                    ),
                )
            })?,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DatasetError::write(name, e))?;
    }
    fs::write(&path, raw).map_err(|e| DatasetError::write(name, e))?;

    Ok(path)
}

/// Returns whether a loadable copy exists on disk.
#[must_use]
pub fn exists(name: &str, config: &DatasetConfig) -> bool {
    read_path(name, config).is_ok_and(|p| p.is_file())
}

fn read_path(name: &str, config: &DatasetConfig) -> Result<PathBuf, DatasetError> {
    if config.versioned {
        let latest = latest_version(name, config)?;
        Ok(config
            .location
            .join(latest)
            .join(data_file_name(config.format)))
    } else {
        Ok(config.location.clone())
    }
}

fn write_path(config: &DatasetConfig) -> PathBuf {
    if config.versioned {
        config
            .location
            .join(generate_version())
            .join(data_file_name(config.format))
    } else {
        config.location.clone()
    }
}

fn data_file_name(format: DatasetFormat) -> String {
    format!("data.{}", format.extension())
}

fn latest_version(name: &str, config: &DatasetConfig) -> Result<String, DatasetError> {
    let no_versions = || DatasetError::NoVersions {
        name: name.to_string(),
        location: config.location.display().to_string(),
    };

    let entries = fs::read_dir(&config.location).map_err(|_| no_versions())?;

    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .max()
        .ok_or_else(no_versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::json(dir.path().join("value.json"));

        let value = json!({"user_id": 1, "rating": 4.5});
        save("ratings", &config, &value).unwrap();

        assert!(exists("ratings", &config));
        assert_eq!(load("ratings", &config).unwrap(), value);
    }

    #[test]
    fn test_text_requires_string() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::text(dir.path().join("note.txt"));

        let err = save("note", &config, &json!(42)).unwrap_err();
        assert!(err.to_string().contains("string value"));

        save("note", &config, &json!("hello")).unwrap();
        assert_eq!(load("note", &config).unwrap(), json!("hello"));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let config = DatasetConfig::json("/nonexistent/value.json");
        let err = load("ghost", &config).unwrap_err();
        assert!(matches!(err, DatasetError::Load { .. }));
    }

    #[test]
    fn test_versioned_writes_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::json(dir.path().join("model")).versioned();

        let first = save("model", &config, &json!({"v": 1})).unwrap();
        // Version strings have millisecond resolution.
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = save("model", &config, &json!({"v": 2})).unwrap();

        assert_ne!(first, second);
        assert!(first.is_file());
        assert_eq!(load("model", &config).unwrap(), json!({"v": 2}));
    }

    #[test]
    fn test_versioned_load_without_versions() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::json(dir.path().join("empty")).versioned();

        let err = load("empty", &config).unwrap_err();
        assert!(matches!(err, DatasetError::NoVersions { .. }));
    }
}
