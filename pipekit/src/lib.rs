//! # Pipekit
//!
//! A declarative, tag-filtered pipeline composition and execution
//! model:
//!
//! - **Pipelines**: immutable DAGs of named nodes, wired by matching
//!   output dataset names to input dataset names
//! - **Tag filtering**: select subgraphs by node tags, with dangling
//!   inputs resolved against the catalog at run time
//! - **Catalog**: logical dataset names mapped to storage descriptors,
//!   with in-memory feeding, `params:` access and versioned writes
//! - **Runners**: sequential and parallel execution with deterministic
//!   ordering, event emission and cooperative cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipekit::prelude::*;
//!
//! let pipeline = Pipeline::new("prep", vec![
//!     Node::from_fn("ingest", Vec::<String>::new(), ["rows"], |_| Ok(vec![json!([1, 2])]))
//!         .with_tag("raw"),
//!     Node::from_fn("total", ["rows"], ["total"], |inputs| { /* ... */ Ok(vec![]) })
//!         .with_tag("recsys"),
//! ])?;
//!
//! let catalog = Arc::new(DataCatalog::new());
//! let result = SequentialRunner::new()
//!     .run(&pipeline, catalog, &RunContext::new())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod node;
pub mod pipeline;
pub mod registry;
pub mod runner;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::catalog::{DataCatalog, DatasetConfig, DatasetFormat};
    pub use crate::config::ProjectConfig;
    pub use crate::errors::{
        CycleDetectedError, DatasetError, PipekitError, PipelineBuildError,
        RegistryError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RunEvent,
    };
    pub use crate::node::{FnNode, Node, NodeFn};
    pub use crate::pipeline::Pipeline;
    pub use crate::registry::PipelineRegistry;
    pub use crate::runner::{
        NodeRunResult, NodeStatus, ParallelRunner, RunContext, RunIdentity,
        RunResult, Runner, SequentialRunner,
    };
}
