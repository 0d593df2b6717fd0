//! End-to-end runs over filtered pipelines and filesystem catalogs.

use super::{RunContext, Runner, SequentialRunner};
use crate::catalog::{DataCatalog, DatasetConfig};
use crate::errors::{DatasetError, PipekitError};
use crate::node::Node;
use crate::pipeline::Pipeline;
use crate::registry::PipelineRegistry;
use crate::runner::ParallelRunner;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

fn tagged_pipeline() -> Pipeline {
    Pipeline::new(
        "rec_prep",
        vec![
            Node::from_fn("extract", Vec::<String>::new(), ["x"], |_| {
                Ok(vec![json!([1, 2, 3])])
            })
            .with_tag("raw"),
            Node::from_fn("score", ["x"], ["y"], |inputs| {
                let total: i64 = inputs[0]
                    .as_array()
                    .map(|a| a.iter().filter_map(serde_json::Value::as_i64).sum())
                    .unwrap_or(0);
                Ok(vec![json!(total)])
            })
            .with_tag("recsys"),
        ],
    )
    .unwrap()
}

fn tags(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

#[tokio::test]
async fn filtered_run_without_upstream_dataset_fails_with_missing() {
    let pipeline = tagged_pipeline();
    let filtered = pipeline.filter_by_tags(&tags(&["recsys"])).unwrap();
    assert_eq!(filtered.node_names(), vec!["score"]);

    let result = SequentialRunner::new()
        .run(&filtered, Arc::new(DataCatalog::new()), &RunContext::new())
        .await
        .unwrap();

    assert!(!result.success);
    match result.error {
        Some(PipekitError::Dataset(DatasetError::Missing { name })) => {
            assert_eq!(name, "x");
        }
        other => panic!("expected missing dataset error, got {other:?}"),
    }
}

#[tokio::test]
async fn filtered_run_falls_back_to_persisted_dataset() {
    let pipeline = tagged_pipeline();
    let catalog = Arc::new(DataCatalog::new());

    // A previous run persisted 'x'; the recsys-only selection reuses it.
    catalog.save("x", json!([10, 20])).unwrap();

    let filtered = pipeline.filter_by_tags(&tags(&["recsys"])).unwrap();
    let result = SequentialRunner::new()
        .run(&filtered, catalog.clone(), &RunContext::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(catalog.load("y").unwrap(), json!(30));
}

#[tokio::test]
async fn unfiltered_run_persists_both_datasets() {
    let pipeline = tagged_pipeline();
    let catalog = Arc::new(DataCatalog::new());

    let result = SequentialRunner::new()
        .run(&pipeline, catalog.clone(), &RunContext::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(catalog.load("x").unwrap(), json!([1, 2, 3]));
    assert_eq!(catalog.load("y").unwrap(), json!(6));
}

#[tokio::test]
async fn halted_run_leaves_prior_outputs_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let x_path = dir.path().join("x.json");

    let mut entries = HashMap::new();
    entries.insert("x".to_string(), DatasetConfig::json(&x_path));
    let catalog = Arc::new(DataCatalog::with_entries(entries));

    let pipeline = Pipeline::new(
        "halting",
        vec![
            Node::from_fn("write_x", Vec::<String>::new(), ["x"], |_| {
                Ok(vec![json!({"rows": 3})])
            }),
            Node::from_fn("explode", ["x"], ["y"], |_| {
                Err(anyhow::anyhow!("schema mismatch"))
            }),
        ],
    )
    .unwrap();

    let result = SequentialRunner::new()
        .run(&pipeline, catalog, &RunContext::new())
        .await
        .unwrap();

    assert!(!result.success);
    // No rollback: the persisted copy of 'x' remains readable.
    assert!(x_path.is_file());
    let fresh = DataCatalog::with_entries(
        [("x".to_string(), DatasetConfig::json(&x_path))]
            .into_iter()
            .collect(),
    );
    assert_eq!(fresh.load("x").unwrap(), json!({"rows": 3}));
}

#[tokio::test]
async fn run_through_versioned_entry_keeps_old_copies() {
    let dir = tempfile::tempdir().unwrap();
    let mut entries = HashMap::new();
    entries.insert(
        "scores".to_string(),
        DatasetConfig::json(dir.path().join("scores")).versioned(),
    );
    let catalog = Arc::new(DataCatalog::with_entries(entries));

    let pipeline = Pipeline::new(
        "scoring",
        vec![Node::from_fn(
            "emit",
            Vec::<String>::new(),
            ["scores"],
            |_| Ok(vec![json!([0.1, 0.9])]),
        )],
    )
    .unwrap();

    let runner = SequentialRunner::new();
    runner
        .run(&pipeline, catalog.clone(), &RunContext::new())
        .await
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    runner
        .run(&pipeline, catalog.clone(), &RunContext::new())
        .await
        .unwrap();

    let versions = std::fs::read_dir(dir.path().join("scores"))
        .unwrap()
        .count();
    assert_eq!(versions, 2);
}

#[tokio::test]
async fn params_feed_nodes_like_datasets() {
    let catalog = Arc::new(DataCatalog::new());
    let params = serde_json::from_value::<serde_json::Map<String, serde_json::Value>>(
        json!({"threshold": 2}),
    )
    .unwrap();
    catalog.insert_parameters(&params);
    catalog.feed("ratings", json!([1, 2, 3, 4]));

    let pipeline = Pipeline::new(
        "thresholding",
        vec![Node::from_fn(
            "filter_low",
            ["ratings", "params:threshold"],
            ["kept"],
            |inputs| {
                let threshold = inputs[1].as_i64().unwrap_or(0);
                let kept: Vec<i64> = inputs[0]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(serde_json::Value::as_i64)
                            .filter(|v| *v > threshold)
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(vec![json!(kept)])
            },
        )],
    )
    .unwrap();

    let result = SequentialRunner::new()
        .run(&pipeline, catalog.clone(), &RunContext::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(catalog.load("kept").unwrap(), json!([3, 4]));
}

#[tokio::test]
async fn both_runners_produce_identical_values() {
    let pipeline = tagged_pipeline();

    let sequential_catalog = Arc::new(DataCatalog::new());
    SequentialRunner::new()
        .run(&pipeline, sequential_catalog.clone(), &RunContext::new())
        .await
        .unwrap();

    let parallel_catalog = Arc::new(DataCatalog::new());
    ParallelRunner::new()
        .run(&pipeline, parallel_catalog.clone(), &RunContext::new())
        .await
        .unwrap();

    assert_eq!(
        sequential_catalog.load("y").unwrap(),
        parallel_catalog.load("y").unwrap()
    );
}

#[tokio::test]
async fn registry_composition_runs_end_to_end() {
    let mut registry = PipelineRegistry::new();
    registry
        .register(
            "raw",
            Pipeline::new(
                "raw",
                vec![Node::from_fn(
                    "ingest",
                    Vec::<String>::new(),
                    ["rows"],
                    |_| Ok(vec![json!([5, 7])]),
                )
                .with_tag("raw")],
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .register(
            "recsys",
            Pipeline::new(
                "recsys",
                vec![Node::from_fn("total", ["rows"], ["total"], |inputs| {
                    let total: i64 = inputs[0]
                        .as_array()
                        .map(|a| a.iter().filter_map(serde_json::Value::as_i64).sum())
                        .unwrap_or(0);
                    Ok(vec![json!(total)])
                })
                .with_tag("recsys")],
            )
            .unwrap(),
        )
        .unwrap();

    let combined = registry.compose("__default__", &["raw", "recsys"]).unwrap();
    let catalog = Arc::new(DataCatalog::new());

    let result = SequentialRunner::new()
        .run(&combined, catalog.clone(), &RunContext::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(catalog.load("total").unwrap(), json!(12));
}
