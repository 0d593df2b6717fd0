//! Pipeline registry.
//!
//! Holds all known pipelines keyed by name and supports composition
//! without mutating the originals. The registry is an explicit context
//! object; there is no ambient global registry.

use crate::errors::{PipekitError, RegistryError};
use crate::pipeline::Pipeline;
use std::collections::HashMap;
use std::sync::Arc;

/// A process-wide mapping from pipeline name to pipeline.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: HashMap<String, Arc<Pipeline>>,
    /// Registration order, for stable listings.
    order: Vec<String>,
}

impl PipelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pipeline under a name.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` if the name is taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        pipeline: Pipeline,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.pipelines.contains_key(&name) {
            return Err(RegistryError::duplicate(name));
        }
        self.order.push(name.clone());
        self.pipelines.insert(name, Arc::new(pipeline));
        Ok(())
    }

    /// Looks up a pipeline by name.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` listing the registered names.
    pub fn get(&self, name: &str) -> Result<Arc<Pipeline>, RegistryError> {
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(name, self.names()))
    }

    /// Returns the registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Returns the number of registered pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Builds the union of the named pipelines, registers it under
    /// `name`, and returns it.
    ///
    /// Node names and output writers must not collide across the
    /// composed pipelines; collisions are construction errors.
    ///
    /// # Errors
    ///
    /// Returns an error if a source name is unknown, the composed
    /// pipeline fails validation, or `name` is already registered.
    pub fn compose(
        &mut self,
        name: impl Into<String>,
        sources: &[&str],
    ) -> Result<Arc<Pipeline>, PipekitError> {
        let name = name.into();

        let mut nodes = Vec::new();
        for source in sources {
            let pipeline = self.get(source)?;
            nodes.extend(pipeline.nodes().iter().cloned());
        }

        let composed = Pipeline::new(name.clone(), nodes)?;
        self.register(name.clone(), composed)?;
        Ok(self.get(&name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn pipeline(name: &str, node_name: &str, output: &str) -> Pipeline {
        Pipeline::new(
            name,
            vec![Node::from_fn(node_name, Vec::<String>::new(), [output], Ok)],
        )
        .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = PipelineRegistry::new();
        registry.register("raw", pipeline("raw", "a", "x")).unwrap();

        let fetched = registry.get("raw").unwrap();
        assert_eq!(fetched.name(), "raw");
        assert_eq!(registry.names(), vec!["raw"]);
    }

    #[test]
    fn test_register_duplicate_name_fails() {
        let mut registry = PipelineRegistry::new();
        registry.register("raw", pipeline("raw", "a", "x")).unwrap();

        let err = registry
            .register("raw", pipeline("raw", "b", "y"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
    }

    #[test]
    fn test_get_missing_lists_available() {
        let mut registry = PipelineRegistry::new();
        registry.register("raw", pipeline("raw", "a", "x")).unwrap();

        let err = registry.get("recsys").unwrap_err();
        assert!(err.to_string().contains("raw"));
    }

    #[test]
    fn test_compose_union() {
        let mut registry = PipelineRegistry::new();
        registry.register("raw", pipeline("raw", "a", "x")).unwrap();
        registry
            .register("recsys", pipeline("recsys", "b", "y"))
            .unwrap();

        let combined = registry
            .compose("__default__", &["raw", "recsys"])
            .unwrap();

        assert_eq!(combined.node_count(), 2);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("__default__").is_ok());
    }

    #[test]
    fn test_compose_collision_fails() {
        let mut registry = PipelineRegistry::new();
        registry.register("one", pipeline("one", "a", "x")).unwrap();
        registry.register("two", pipeline("two", "a", "y")).unwrap();

        let err = registry.compose("both", &["one", "two"]).unwrap_err();
        assert!(err.to_string().contains("duplicate node name"));
    }
}
