//! Node trait and the node value type.
//!
//! Nodes are the fundamental units of work in a pipekit pipeline: a
//! named computation from an ordered list of input datasets to an
//! ordered list of output datasets, annotated with tags for selection.

use crate::errors::PipelineBuildError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for node computations.
///
/// A computation receives the loaded input values in declaration order
/// and returns one value per declared output, in declaration order.
#[async_trait]
pub trait NodeFn: Send + Sync + Debug {
    /// Runs the computation.
    ///
    /// # Errors
    ///
    /// Any error returned here aborts the current run; it is reported
    /// together with the node's name.
    async fn run(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>>;
}

/// A computation backed by a plain function or closure.
pub struct FnNode<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync,
{
    func: F,
}

impl<F> FnNode<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync,
{
    /// Creates a new function-backed computation.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnNode<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnNode").finish()
    }
}

#[async_trait]
impl<F> NodeFn for FnNode<F>
where
    F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync,
{
    async fn run(&self, inputs: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        (self.func)(inputs)
    }
}

/// A single named processing step in a pipeline.
///
/// Dependencies between nodes are induced by matching output dataset
/// names to input dataset names; nodes never reference each other
/// directly.
#[derive(Debug, Clone)]
pub struct Node {
    /// The unique node name.
    pub name: String,
    /// Input dataset names, in the order the computation receives them.
    pub inputs: Vec<String>,
    /// Output dataset names, in the order the computation returns them.
    ///
    /// May be empty for side-effect nodes.
    pub outputs: Vec<String>,
    /// Tags used for selection; carry no other semantics.
    pub tags: BTreeSet<String>,
    /// The computation.
    pub func: Arc<dyn NodeFn>,
}

impl Node {
    /// Creates a new node.
    pub fn new(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = impl Into<String>>,
        outputs: impl IntoIterator<Item = impl Into<String>>,
        func: Arc<dyn NodeFn>,
    ) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            tags: BTreeSet::new(),
            func,
        }
    }

    /// Creates a node from a plain function or closure.
    pub fn from_fn<F>(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = impl Into<String>>,
        outputs: impl IntoIterator<Item = impl Into<String>>,
        func: F,
    ) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self::new(name, inputs, outputs, Arc::new(FnNode::new(func)))
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Adds several tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Returns whether the node's tag set intersects `tags`.
    #[must_use]
    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }

    /// Validates the node in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, the node declares the
    /// same output dataset twice, or a dataset appears as both input
    /// and output.
    pub fn validate(&self) -> Result<(), PipelineBuildError> {
        if self.name.trim().is_empty() {
            return Err(PipelineBuildError::new(
                "node name cannot be empty or whitespace-only",
            ));
        }

        let mut seen = BTreeSet::new();
        for output in &self.outputs {
            if !seen.insert(output) {
                return Err(PipelineBuildError::new(format!(
                    "node '{}' declares output '{}' more than once",
                    self.name, output
                ))
                .with_nodes(vec![self.name.clone()]));
            }
            if self.inputs.contains(output) {
                return Err(PipelineBuildError::new(format!(
                    "node '{}' declares '{}' as both input and output",
                    self.name, output
                ))
                .with_nodes(vec![self.name.clone()]));
            }
        }

        Ok(())
    }
}
