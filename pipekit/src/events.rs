//! Run and node lifecycle events.
//!
//! Runners report progress through an [`EventSink`] rather than writing
//! to output streams directly; sinks exist for discarding, structured
//! logging and test collection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

/// A lifecycle event emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run began.
    RunStarted {
        /// The run id.
        run_id: Uuid,
        /// The pipeline being run.
        pipeline: String,
        /// Number of nodes selected for execution.
        node_count: usize,
    },
    /// A node began executing.
    NodeStarted {
        /// The node name.
        node: String,
    },
    /// A node finished successfully.
    NodeCompleted {
        /// The node name.
        node: String,
        /// Wall-clock duration in milliseconds.
        duration_ms: f64,
    },
    /// A node failed; the run halts.
    NodeFailed {
        /// The node name.
        node: String,
        /// The rendered error.
        error: String,
    },
    /// The run finished with every node succeeding.
    RunCompleted {
        /// The run id.
        run_id: Uuid,
        /// Wall-clock duration in milliseconds.
        duration_ms: f64,
    },
    /// The run halted on a failure.
    RunFailed {
        /// The run id.
        run_id: Uuid,
        /// The rendered error.
        error: String,
    },
    /// The run was aborted between nodes.
    RunCancelled {
        /// The run id.
        run_id: Uuid,
        /// The cancellation reason.
        reason: String,
    },
}

/// Trait for sinks receiving run events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: RunEvent);

    /// Emits an event without awaiting. Must never fail; errors are
    /// swallowed.
    fn try_emit(&self, event: RunEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: RunEvent) {}

    fn try_emit(&self, _event: RunEvent) {}
}

/// A sink that emits structured log records through `tracing`.
///
/// Node start/end are logged at info, failures and cancellations at
/// error/warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    /// Creates a new logging sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn log(event: &RunEvent) {
        match event {
            RunEvent::RunStarted {
                run_id,
                pipeline,
                node_count,
            } => {
                info!(%run_id, %pipeline, node_count, "run started");
            }
            RunEvent::NodeStarted { node } => {
                info!(%node, "node started");
            }
            RunEvent::NodeCompleted { node, duration_ms } => {
                info!(%node, duration_ms, "node completed");
            }
            RunEvent::NodeFailed { node, error } => {
                error!(%node, %error, "node failed");
            }
            RunEvent::RunCompleted {
                run_id,
                duration_ms,
            } => {
                info!(%run_id, duration_ms, "run completed successfully");
            }
            RunEvent::RunFailed { run_id, error } => {
                error!(%run_id, %error, "run failed");
            }
            RunEvent::RunCancelled { run_id, reason } => {
                warn!(%run_id, %reason, "run cancelled");
            }
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: RunEvent) {
        Self::log(&event);
    }

    fn try_emit(&self, event: RunEvent) {
        Self::log(&event);
    }
}

/// A sink collecting events in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<RunEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns the names of nodes that completed, in order.
    #[must_use]
    pub fn completed_nodes(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                RunEvent::NodeCompleted { node, .. } => Some(node.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: RunEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: RunEvent) {
        self.events.write().push(event);
    }
}
