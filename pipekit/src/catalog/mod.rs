//! The data catalog.
//!
//! Maps logical dataset names to storage descriptors and holds the
//! in-memory values produced during a run. Within a run, an in-memory
//! value always wins over a stale persisted copy; datasets without a
//! backing entry live purely in memory.

pub mod config;
pub mod storage;

pub use config::{DatasetConfig, DatasetFormat};

use crate::errors::DatasetError;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Prefix under which parameters are exposed as read-only datasets.
pub const PARAMS_PREFIX: &str = "params:";

/// Dataset name holding the full parameter map.
pub const PARAMETERS_DATASET: &str = "parameters";

/// A catalog resolving dataset names to load/save operations.
///
/// Thread-safe: all methods take `&self`, so a catalog can be shared
/// across concurrently running nodes. Concurrent writers to the same
/// dataset name are serialized through a per-dataset lock.
#[derive(Debug, Default)]
pub struct DataCatalog {
    entries: HashMap<String, DatasetConfig>,
    memory: DashMap<String, Value>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl DataCatalog {
    /// Creates a catalog with no configured entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog from configured entries.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, DatasetConfig>) -> Self {
        Self {
            entries,
            memory: DashMap::new(),
            write_locks: DashMap::new(),
        }
    }

    /// Seeds an in-memory value, bypassing any backing entry.
    pub fn feed(&self, name: impl Into<String>, value: Value) {
        self.memory.insert(name.into(), value);
    }

    /// Exposes a parameter map as `params:`-prefixed datasets.
    ///
    /// Each top-level key becomes `params:<key>`; nested objects are
    /// additionally flattened with dotted access
    /// (`params:model_options.test_size`). The full map is available
    /// under the `parameters` dataset.
    pub fn insert_parameters(&self, parameters: &serde_json::Map<String, Value>) {
        self.memory.insert(
            PARAMETERS_DATASET.to_string(),
            Value::Object(parameters.clone()),
        );
        for (key, value) in parameters {
            self.insert_parameter_tree(key, value);
        }
    }

    fn insert_parameter_tree(&self, path: &str, value: &Value) {
        self.memory
            .insert(format!("{PARAMS_PREFIX}{path}"), value.clone());
        if let Value::Object(map) = value {
            for (key, child) in map {
                self.insert_parameter_tree(&format!("{path}.{key}"), child);
            }
        }
    }

    /// Loads a dataset value.
    ///
    /// Resolution order: in-memory value from the current run, then the
    /// backing entry.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::Missing` if neither exists, or a
    /// load/serde error from the backing store.
    pub fn load(&self, name: &str) -> Result<Value, DatasetError> {
        if let Some(value) = self.memory.get(name) {
            return Ok(value.clone());
        }

        match self.entries.get(name) {
            Some(config) => {
                debug!(dataset = %name, location = %config.location.display(), "loading dataset");
                storage::load(name, config)
            }
            None => Err(DatasetError::missing(name)),
        }
    }

    /// Saves a dataset value.
    ///
    /// Persists through the backing entry when one is configured and
    /// always records the in-memory copy, so downstream nodes in the
    /// same run see the fresh value.
    ///
    /// # Errors
    ///
    /// Returns a write/serde error from the backing store.
    pub fn save(&self, name: &str, value: Value) -> Result<(), DatasetError> {
        if let Some(config) = self.entries.get(name) {
            let lock = self
                .write_locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let _guard = lock.lock();

            let path = storage::save(name, config, &value)?;
            debug!(dataset = %name, path = %path.display(), "saved dataset");
        }

        self.memory.insert(name.to_string(), value);
        Ok(())
    }

    /// Returns whether a value can currently be loaded for `name`.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        if self.memory.contains_key(name) {
            return true;
        }
        self.entries
            .get(name)
            .is_some_and(|config| storage::exists(name, config))
    }

    /// Returns the configured entry for a dataset, if any.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&DatasetConfig> {
        self.entries.get(name)
    }

    /// Returns the configured entry names, sorted.
    #[must_use]
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops all in-memory values, keeping configured entries.
    ///
    /// Used between runs that share a catalog but must not see each
    /// other's transient results.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }
}
