//! Environment-layered configuration loading.
//!
//! Configuration lives in a directory with one subdirectory per
//! environment. `base` holds the shared configuration; the run
//! environment (typically `local`, never committed) overlays it
//! entry-by-entry. Credentials and machine-specific paths belong in
//! the local environment only.

use crate::catalog::{DataCatalog, DatasetConfig};
use crate::errors::PipekitError;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Name of the shared configuration environment.
pub const BASE_ENV: &str = "base";

/// Catalog configuration file name within an environment.
pub const CATALOG_FILE: &str = "catalog.json";

/// Parameters file name within an environment.
pub const PARAMETERS_FILE: &str = "parameters.json";

/// Merged project configuration: catalog entries plus parameters.
#[derive(Debug, Default)]
pub struct ProjectConfig {
    /// Dataset entries keyed by dataset name.
    pub catalog: HashMap<String, DatasetConfig>,
    /// Parameter map exposed to nodes under the `params:` namespace.
    pub parameters: serde_json::Map<String, Value>,
}

impl ProjectConfig {
    /// Loads configuration from `conf_dir`, overlaying `env` on top of
    /// `base`. Missing files and directories are treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be read or parsed.
    pub fn load(conf_dir: &Path, env: &str) -> Result<Self, PipekitError> {
        let mut catalog = read_json_map::<DatasetConfig>(&conf_dir.join(BASE_ENV).join(CATALOG_FILE))?;
        let mut parameters = read_object(&conf_dir.join(BASE_ENV).join(PARAMETERS_FILE))?;

        if env != BASE_ENV {
            let env_dir = conf_dir.join(env);
            for (name, entry) in read_json_map::<DatasetConfig>(&env_dir.join(CATALOG_FILE))? {
                catalog.insert(name, entry);
            }
            for (key, value) in read_object(&env_dir.join(PARAMETERS_FILE))? {
                parameters.insert(key, value);
            }
        }

        Ok(Self {
            catalog,
            parameters,
        })
    }

    /// Builds a catalog from the merged configuration, with parameters
    /// pre-seeded into the `params:` namespace.
    #[must_use]
    pub fn into_catalog(self) -> DataCatalog {
        let catalog = DataCatalog::with_entries(self.catalog);
        catalog.insert_parameters(&self.parameters);
        catalog
    }
}

fn read_json_map<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<HashMap<String, T>, PipekitError> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        PipekitError::Internal(format!(
            "failed to parse '{}': {e}",
            path.display()
        ))
    })
}

fn read_object(path: &Path) -> Result<serde_json::Map<String, Value>, PipekitError> {
    if !path.is_file() {
        return Ok(serde_json::Map::new());
    }
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        PipekitError::Internal(format!(
            "failed to parse '{}': {e}",
            path.display()
        ))
    })
}
