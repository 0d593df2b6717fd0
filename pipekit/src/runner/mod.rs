//! Pipeline runners.
//!
//! A runner executes a pipeline's nodes in an order consistent with
//! their data dependencies, resolving every input and output through
//! the catalog. [`SequentialRunner`] is the reference implementation;
//! [`ParallelRunner`] runs independent branches concurrently with the
//! same ordering guarantees for dependent nodes.

pub mod parallel;

#[cfg(test)]
mod integration_tests;

pub use parallel::ParallelRunner;

use crate::cancellation::CancellationToken;
use crate::catalog::DataCatalog;
use crate::errors::PipekitError;
use crate::events::{EventSink, NoOpEventSink, RunEvent};
use crate::node::Node;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Identity of a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique id for this run.
    pub run_id: Uuid,
    /// When the run context was created.
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a new identity with a generated run id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit per-run context passed to runners.
///
/// There are no ambient globals; everything a run needs travels here.
pub struct RunContext {
    /// The run identity.
    pub identity: RunIdentity,
    /// Sink receiving lifecycle events.
    pub sink: Arc<dyn EventSink>,
    /// Cooperative cancellation token, checked between nodes.
    pub cancel: Arc<CancellationToken>,
}

impl RunContext {
    /// Creates a context with a fresh identity and a no-op sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: RunIdentity::new(),
            sink: Arc::new(NoOpEventSink),
            cancel: Arc::new(CancellationToken::new()),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Per-node execution status within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// The node completed successfully.
    Ok,
    /// The node failed and halted the run.
    Fail,
}

/// The outcome of one node within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRunResult {
    /// The node name.
    pub node: String,
    /// The execution status.
    pub status: NodeStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// The rendered error, for failed nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The outcome of a run.
///
/// Ephemeral: not persisted beyond logs and the caller's hands.
#[derive(Debug)]
pub struct RunResult {
    /// The run id.
    pub run_id: Uuid,
    /// The pipeline that ran.
    pub pipeline: String,
    /// Per-node outcomes, in completion order. Nodes the run never
    /// reached are absent.
    pub node_results: Vec<NodeRunResult>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Whether every selected node succeeded.
    pub success: bool,
    /// The first error, when the run halted.
    pub error: Option<PipekitError>,
}

/// Trait for pipeline runners.
#[async_trait]
pub trait Runner: Send + Sync + Debug {
    /// Runs the pipeline against the catalog.
    ///
    /// Node failures are reported inside the returned [`RunResult`];
    /// `Err` is reserved for runner-internal faults such as a
    /// deadlocked graph.
    ///
    /// # Errors
    ///
    /// Returns an error only on internal runner faults.
    async fn run(
        &self,
        pipeline: &Pipeline,
        catalog: Arc<DataCatalog>,
        ctx: &RunContext,
    ) -> Result<RunResult, PipekitError>;
}

/// Loads a node's inputs, runs its computation and persists its
/// declared outputs through the catalog.
pub(crate) async fn execute_node(
    node: &Node,
    catalog: &DataCatalog,
) -> Result<(), PipekitError> {
    let mut inputs = Vec::with_capacity(node.inputs.len());
    for input in &node.inputs {
        inputs.push(catalog.load(input)?);
    }

    let outputs = node
        .func
        .run(inputs)
        .await
        .map_err(|cause| PipekitError::node_execution(&node.name, cause))?;

    if outputs.len() != node.outputs.len() {
        return Err(PipekitError::OutputArity {
            node: node.name.clone(),
            declared: node.outputs.len(),
            produced: outputs.len(),
        });
    }

    for (name, value) in node.outputs.iter().zip(outputs) {
        catalog.save(name, value)?;
    }

    Ok(())
}

/// Runs nodes one at a time in topological order.
///
/// The order is deterministic: data-dependency order with registration
/// order as the tie-break, so repeated runs over the same inputs yield
/// identical results.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialRunner;

impl SequentialRunner {
    /// Creates a new sequential runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Runner for SequentialRunner {
    async fn run(
        &self,
        pipeline: &Pipeline,
        catalog: Arc<DataCatalog>,
        ctx: &RunContext,
    ) -> Result<RunResult, PipekitError> {
        let start = Instant::now();
        let run_id = ctx.identity.run_id;
        let mut node_results = Vec::with_capacity(pipeline.node_count());

        ctx.sink
            .emit(RunEvent::RunStarted {
                run_id,
                pipeline: pipeline.name().to_string(),
                node_count: pipeline.node_count(),
            })
            .await;

        for node in pipeline.ordered_nodes() {
            if ctx.cancel.is_cancelled() {
                let reason = ctx
                    .cancel
                    .reason()
                    .unwrap_or_else(|| "cancelled".to_string());
                ctx.sink
                    .emit(RunEvent::RunCancelled {
                        run_id,
                        reason: reason.clone(),
                    })
                    .await;
                return Ok(RunResult {
                    run_id,
                    pipeline: pipeline.name().to_string(),
                    node_results,
                    duration_ms: elapsed_ms(start),
                    success: false,
                    error: Some(PipekitError::Cancelled(reason)),
                });
            }

            ctx.sink
                .emit(RunEvent::NodeStarted {
                    node: node.name.clone(),
                })
                .await;

            let node_start = Instant::now();
            match execute_node(node, &catalog).await {
                Ok(()) => {
                    let duration_ms = elapsed_ms(node_start);
                    ctx.sink
                        .emit(RunEvent::NodeCompleted {
                            node: node.name.clone(),
                            duration_ms,
                        })
                        .await;
                    node_results.push(NodeRunResult {
                        node: node.name.clone(),
                        status: NodeStatus::Ok,
                        duration_ms,
                        error: None,
                    });
                }
                Err(error) => {
                    let rendered = error.to_string();
                    ctx.sink
                        .emit(RunEvent::NodeFailed {
                            node: node.name.clone(),
                            error: rendered.clone(),
                        })
                        .await;
                    ctx.sink
                        .emit(RunEvent::RunFailed {
                            run_id,
                            error: rendered.clone(),
                        })
                        .await;
                    node_results.push(NodeRunResult {
                        node: node.name.clone(),
                        status: NodeStatus::Fail,
                        duration_ms: elapsed_ms(node_start),
                        error: Some(rendered),
                    });
                    return Ok(RunResult {
                        run_id,
                        pipeline: pipeline.name().to_string(),
                        node_results,
                        duration_ms: elapsed_ms(start),
                        success: false,
                        error: Some(error),
                    });
                }
            }
        }

        let duration_ms = elapsed_ms(start);
        ctx.sink
            .emit(RunEvent::RunCompleted {
                run_id,
                duration_ms,
            })
            .await;

        Ok(RunResult {
            run_id,
            pipeline: pipeline.name().to_string(),
            node_results,
            duration_ms,
            success: true,
            error: None,
        })
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
