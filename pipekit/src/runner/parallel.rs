//! Parallel runner for independent branches.
//!
//! Nodes are spawned as soon as every node producing one of their
//! inputs has completed, so dependent nodes keep the same ordering
//! guarantees as the sequential runner while independent branches
//! overlap.

use super::{
    elapsed_ms, execute_node, NodeRunResult, NodeStatus, RunContext, RunResult, Runner,
};
use crate::catalog::DataCatalog;
use crate::errors::PipekitError;
use crate::events::{EventSink, RunEvent};
use crate::node::Node;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;

type NodeTask = tokio::task::JoinHandle<(usize, f64, Result<(), PipekitError>)>;

/// Runs independent branches concurrently on the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelRunner;

impl ParallelRunner {
    /// Creates a new parallel runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn spawn_node(
        index: usize,
        node: &Node,
        catalog: &Arc<DataCatalog>,
        sink: &Arc<dyn EventSink>,
    ) -> NodeTask {
        let node = node.clone();
        let catalog = Arc::clone(catalog);
        let sink = Arc::clone(sink);

        tokio::spawn(async move {
            sink.try_emit(RunEvent::NodeStarted {
                node: node.name.clone(),
            });
            let start = Instant::now();
            let outcome = execute_node(&node, &catalog).await;
            (index, elapsed_ms(start), outcome)
        })
    }
}

#[async_trait]
impl Runner for ParallelRunner {
    async fn run(
        &self,
        pipeline: &Pipeline,
        catalog: Arc<DataCatalog>,
        ctx: &RunContext,
    ) -> Result<RunResult, PipekitError> {
        let start = Instant::now();
        let run_id = ctx.identity.run_id;
        let nodes = pipeline.nodes();
        let dependencies = pipeline.dependency_sets();

        ctx.sink
            .emit(RunEvent::RunStarted {
                run_id,
                pipeline: pipeline.name().to_string(),
                node_count: nodes.len(),
            })
            .await;

        let mut in_degree: Vec<usize> = dependencies.iter().map(std::collections::BTreeSet::len).collect();
        let mut active: FuturesUnordered<NodeTask> = FuturesUnordered::new();
        let mut node_results = Vec::with_capacity(nodes.len());
        let mut completed = vec![false; nodes.len()];
        let mut completed_count = 0;

        for (index, node) in nodes.iter().enumerate() {
            if in_degree[index] == 0 {
                active.push(Self::spawn_node(index, node, &catalog, &ctx.sink));
            }
        }

        while completed_count < nodes.len() {
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

            let Some(joined) = active.next().await else {
                let pending: Vec<String> = nodes
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !completed[*i])
                    .map(|(_, n)| n.name.clone())
                    .collect();
                return Err(PipekitError::Internal(format!(
                    "deadlocked node graph; remaining nodes: {pending:?}"
                )));
            };

            let (index, duration_ms, outcome) = joined
                .map_err(|e| PipekitError::Internal(format!("task join error: {e}")))?;
            let name = nodes[index].name.clone();

            match outcome {
                Ok(()) => {
                    ctx.sink
                        .emit(RunEvent::NodeCompleted {
                            node: name.clone(),
                            duration_ms,
                        })
                        .await;
                    node_results.push(NodeRunResult {
                        node: name,
                        status: NodeStatus::Ok,
                        duration_ms,
                        error: None,
                    });
                    completed[index] = true;
                    completed_count += 1;

                    for (child, deps) in dependencies.iter().enumerate() {
                        if deps.contains(&index) {
                            in_degree[child] = in_degree[child].saturating_sub(1);
                            if in_degree[child] == 0 && !completed[child] {
                                active.push(Self::spawn_node(
                                    child,
                                    &nodes[child],
                                    &catalog,
                                    &ctx.sink,
                                ));
                            }
                        }
                    }
                }
                Err(error) => {
                    let rendered = error.to_string();
                    ctx.sink
                        .emit(RunEvent::NodeFailed {
                            node: name.clone(),
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
                        node: name,
                        status: NodeStatus::Fail,
                        duration_ms,
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
