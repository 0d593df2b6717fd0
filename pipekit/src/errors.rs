//! Error types for the pipekit framework.
//!
//! The taxonomy separates construction errors (detected when a pipeline
//! is built and fatal for registry setup) from resolution, execution and
//! storage errors (which abort only the current run).

use thiserror::Error;

/// The main error type for pipekit operations.
#[derive(Debug, Error)]
pub enum PipekitError {
    /// A pipeline failed validation at construction time.
    #[error("{0}")]
    Build(#[from] PipelineBuildError),

    /// A registry operation failed.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// A catalog load or save failed.
    #[error("{0}")]
    Dataset(#[from] DatasetError),

    /// A node's computation returned an error.
    #[error("node '{node}' failed: {cause}")]
    NodeExecution {
        /// The node that failed.
        node: String,
        /// The underlying error reported by the node.
        cause: anyhow::Error,
    },

    /// A node produced a different number of outputs than it declared.
    #[error(
        "node '{node}' declared {declared} output(s) but produced {produced}"
    )]
    OutputArity {
        /// The offending node.
        node: String,
        /// Declared output count.
        declared: usize,
        /// Produced output count.
        produced: usize,
    },

    /// The run was cancelled between nodes.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// IO error outside of dataset storage.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipekitError {
    /// Wraps a node computation error with the node's name.
    #[must_use]
    pub fn node_execution(node: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::NodeExecution {
            node: node.into(),
            cause,
        }
    }
}

/// Error raised when a pipeline fails construction-time validation.
///
/// Covers duplicate node names, duplicate output writers and cycles.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineBuildError {
    /// The error message.
    pub message: String,
    /// The nodes involved in the error.
    pub nodes: Vec<String>,
}

impl PipelineBuildError {
    /// Creates a new pipeline build error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            nodes: Vec::new(),
        }
    }

    /// Sets the nodes involved.
    #[must_use]
    pub fn with_nodes(mut self, nodes: Vec<String>) -> Self {
        self.nodes = nodes;
        self
    }
}

/// Error raised when the induced dependency graph contains a cycle.
#[derive(Debug, Clone, Error)]
#[error("cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of nodes forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for PipelineBuildError {
    fn from(err: CycleDetectedError) -> Self {
        let nodes = err.cycle_path.clone();
        Self {
            message: err.to_string(),
            nodes,
        }
    }
}

/// Errors raised by the pipeline registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A pipeline name is already registered.
    #[error("pipeline '{name}' is already registered")]
    DuplicateName {
        /// The duplicated pipeline name.
        name: String,
    },

    /// No pipeline is registered under the requested name.
    #[error("pipeline '{name}' not found; registered pipelines: {}", available.join(", "))]
    NotFound {
        /// The requested pipeline name.
        name: String,
        /// Names that are registered.
        available: Vec<String>,
    },
}

impl RegistryError {
    /// Creates a duplicate name error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>, available: Vec<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            available,
        }
    }
}

/// Errors raised by the data catalog.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// No backing entry and no in-memory value exists for a dataset.
    #[error("dataset '{name}' not found in the catalog and no in-memory value exists")]
    Missing {
        /// The missing dataset name.
        name: String,
    },

    /// The backing store rejected a write.
    #[error("failed to save dataset '{name}': {source}")]
    Write {
        /// The dataset being written.
        name: String,
        /// The underlying IO failure.
        #[source]
        source: std::io::Error,
    },

    /// The backing store could not be read.
    #[error("failed to load dataset '{name}': {source}")]
    Load {
        /// The dataset being read.
        name: String,
        /// The underlying IO failure.
        #[source]
        source: std::io::Error,
    },

    /// A value could not be serialized or deserialized.
    #[error("failed to (de)serialize dataset '{name}': {source}")]
    Serde {
        /// The dataset involved.
        name: String,
        /// The underlying serde failure.
        #[source]
        source: serde_json::Error,
    },

    /// A versioned entry has no versions on disk yet.
    #[error("dataset '{name}' is versioned but no version exists at '{location}'")]
    NoVersions {
        /// The dataset name.
        name: String,
        /// The configured location.
        location: String,
    },
}

impl DatasetError {
    /// Creates a missing dataset error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    /// Creates a write error.
    #[must_use]
    pub fn write(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            name: name.into(),
            source,
        }
    }

    /// Creates a load error.
    #[must_use]
    pub fn load(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Load {
            name: name.into(),
            source,
        }
    }

    /// Creates a serde error.
    #[must_use]
    pub fn serde(name: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serde {
            name: name.into(),
            source,
        }
    }
}
