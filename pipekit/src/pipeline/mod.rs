//! Immutable, validated pipelines.
//!
//! A [`Pipeline`] is a named DAG of [`Node`]s whose edges are induced
//! by matching output dataset names to input dataset names. All
//! construction errors (duplicate node names, duplicate output writers,
//! cycles) are detected here, never at run time.

pub mod graph;

use crate::errors::PipelineBuildError;
use crate::node::Node;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

/// A named, immutable collection of nodes plus their induced graph.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    nodes: Vec<Node>,
    producers: HashMap<String, usize>,
    dependencies: Vec<BTreeSet<usize>>,
    topo_order: Vec<usize>,
}

impl Pipeline {
    /// Builds a pipeline from nodes, validating all invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline is empty, a node fails its own
    /// validation, two nodes share a name, two nodes declare the same
    /// output, or the induced graph contains a cycle.
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<Node>,
    ) -> Result<Self, PipelineBuildError> {
        let name = name.into();

        if nodes.is_empty() {
            return Err(PipelineBuildError::new(format!(
                "pipeline '{name}' contains no nodes"
            )));
        }

        let mut seen_names = BTreeSet::new();
        for node in &nodes {
            node.validate()?;
            if !seen_names.insert(node.name.clone()) {
                return Err(PipelineBuildError::new(format!(
                    "duplicate node name '{}' in pipeline '{}'",
                    node.name, name
                ))
                .with_nodes(vec![node.name.clone()]));
            }
        }

        let producers = graph::build_producers(&nodes)?;
        let dependencies = graph::node_dependencies(&nodes, &producers);
        let topo_order = graph::topological_order(&nodes, &dependencies)
            .map_err(PipelineBuildError::from)?;

        Ok(Self {
            name,
            nodes,
            producers,
            dependencies,
            topo_order,
        })
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the nodes in registration order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the node names in registration order.
    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// Returns the union of all node tags.
    #[must_use]
    pub fn tags(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .flat_map(|n| n.tags.iter().cloned())
            .collect()
    }

    /// Returns every dataset name mentioned by any node.
    #[must_use]
    pub fn datasets(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .flat_map(|n| n.inputs.iter().chain(n.outputs.iter()).cloned())
            .collect()
    }

    /// Returns the inputs that no node in this pipeline produces.
    ///
    /// These must be satisfied by the catalog at run time.
    #[must_use]
    pub fn free_inputs(&self) -> BTreeSet<String> {
        self.nodes
            .iter()
            .flat_map(|n| n.inputs.iter())
            .filter(|input| !self.producers.contains_key(*input))
            .cloned()
            .collect()
    }

    /// Returns the nodes in a data-dependency-consistent order,
    /// tie-broken by registration order.
    #[must_use]
    pub fn ordered_nodes(&self) -> Vec<&Node> {
        self.topo_order.iter().map(|&i| &self.nodes[i]).collect()
    }

    /// Per-node dependency sets over node indices, for runners.
    pub(crate) fn dependency_sets(&self) -> &[BTreeSet<usize>] {
        &self.dependencies
    }

    /// Returns the induced node-to-node edges as (from, to) name pairs.
    #[must_use]
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges = Vec::new();
        for (index, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                edges.push((
                    self.nodes[dep].name.clone(),
                    self.nodes[index].name.clone(),
                ));
            }
        }
        edges.sort();
        edges
    }

    /// Returns a new pipeline keeping only nodes whose tag set
    /// intersects `tags`. An empty filter returns the pipeline
    /// unchanged.
    ///
    /// Filtering may leave inputs without an in-pipeline producer;
    /// those are resolved against the catalog at run time, not here.
    ///
    /// # Errors
    ///
    /// Returns an error if no node matches the filter.
    pub fn filter_by_tags(
        &self,
        tags: &BTreeSet<String>,
    ) -> Result<Self, PipelineBuildError> {
        if tags.is_empty() {
            return Ok(self.clone());
        }

        let survivors: Vec<Node> = self
            .nodes
            .iter()
            .filter(|n| n.has_any_tag(tags))
            .cloned()
            .collect();

        if survivors.is_empty() {
            return Err(PipelineBuildError::new(format!(
                "no node in pipeline '{}' matches tags [{}]",
                self.name,
                tags.iter().cloned().collect::<Vec<_>>().join(", ")
            )));
        }

        Self::new(self.name.clone(), survivors)
    }

    /// Returns the sub-pipeline of the named nodes and everything
    /// downstream of them.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is unknown.
    pub fn from_nodes(&self, names: &[&str]) -> Result<Self, PipelineBuildError> {
        let seeds = self.resolve_names(names)?;
        let keep = self.closure(&seeds, Direction::Downstream);
        self.subset(keep)
    }

    /// Returns the sub-pipeline of the named nodes and everything
    /// upstream of them.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is unknown.
    pub fn to_nodes(&self, names: &[&str]) -> Result<Self, PipelineBuildError> {
        let seeds = self.resolve_names(names)?;
        let keep = self.closure(&seeds, Direction::Upstream);
        self.subset(keep)
    }

    /// Returns a serializable description of the pipeline for external
    /// visualization tools: nodes with inputs/outputs/tags, plus edges.
    #[must_use]
    pub fn manifest(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "nodes": self.nodes.iter().map(|n| json!({
                "name": n.name,
                "inputs": n.inputs,
                "outputs": n.outputs,
                "tags": n.tags.iter().cloned().collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "edges": self.edges().iter().map(|(from, to)| json!([from, to])).collect::<Vec<_>>(),
        })
    }

    fn resolve_names(&self, names: &[&str]) -> Result<BTreeSet<usize>, PipelineBuildError> {
        let mut seeds = BTreeSet::new();
        for name in names {
            let index = self
                .nodes
                .iter()
                .position(|n| n.name == *name)
                .ok_or_else(|| {
                    PipelineBuildError::new(format!(
                        "node '{}' not found in pipeline '{}'",
                        name, self.name
                    ))
                    .with_nodes(vec![(*name).to_string()])
                })?;
            seeds.insert(index);
        }
        Ok(seeds)
    }

    fn closure(&self, seeds: &BTreeSet<usize>, direction: Direction) -> BTreeSet<usize> {
        let mut keep = seeds.clone();
        let mut frontier: Vec<usize> = seeds.iter().copied().collect();

        while let Some(current) = frontier.pop() {
            let next: Vec<usize> = match direction {
                Direction::Upstream => self.dependencies[current].iter().copied().collect(),
                Direction::Downstream => self
                    .dependencies
                    .iter()
                    .enumerate()
                    .filter(|(_, deps)| deps.contains(&current))
                    .map(|(i, _)| i)
                    .collect(),
            };
            for index in next {
                if keep.insert(index) {
                    frontier.push(index);
                }
            }
        }

        keep
    }

    fn subset(&self, keep: BTreeSet<usize>) -> Result<Self, PipelineBuildError> {
        let survivors: Vec<Node> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, n)| n.clone())
            .collect();
        Self::new(self.name.clone(), survivors)
    }
}

enum Direction {
    Upstream,
    Downstream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(name: &str, inputs: &[&str], outputs: &[&str], tags: &[&str]) -> Node {
        Node::from_fn(name, inputs.to_vec(), outputs.to_vec(), Ok)
            .with_tags(tags.to_vec())
    }

    fn sample() -> Pipeline {
        Pipeline::new(
            "sample",
            vec![
                node("ingest", &[], &["x"], &["raw"]),
                node("prep", &["x"], &["y"], &["recsys"]),
                node("report", &["y"], &[], &["recsys"]),
            ],
        )
        .unwrap()
    }

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = Pipeline::new("empty", vec![]).unwrap_err();
        assert!(err.to_string().contains("no nodes"));
    }

    #[test]
    fn test_duplicate_node_name_rejected() {
        let err = Pipeline::new(
            "dup",
            vec![node("a", &[], &["x"], &[]), node("a", &[], &["y"], &[])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate node name 'a'"));
    }

    #[test]
    fn test_duplicate_output_writer_rejected() {
        let err = Pipeline::new(
            "dup",
            vec![node("a", &[], &["x"], &[]), node("b", &[], &["x"], &[])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("output 'x'"));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = Pipeline::new(
            "cyclic",
            vec![node("a", &["z"], &["x"], &[]), node("b", &["x"], &["z"], &[])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_ordered_nodes_follow_dependencies() {
        let pipeline = Pipeline::new(
            "p",
            vec![
                node("last", &["y"], &[], &[]),
                node("first", &[], &["x"], &[]),
                node("middle", &["x"], &["y"], &[]),
            ],
        )
        .unwrap();

        let order: Vec<&str> = pipeline
            .ordered_nodes()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(order, vec!["first", "middle", "last"]);
    }

    #[test]
    fn test_filter_by_empty_tags_is_identity() {
        let pipeline = sample();
        let filtered = pipeline.filter_by_tags(&BTreeSet::new()).unwrap();

        assert_eq!(filtered.node_names(), pipeline.node_names());
        assert_eq!(filtered.edges(), pipeline.edges());
    }

    #[test]
    fn test_filter_by_tags_keeps_only_intersecting() {
        let pipeline = sample();
        let filtered = pipeline.filter_by_tags(&tag_set(&["recsys"])).unwrap();

        assert_eq!(filtered.node_names(), vec!["prep", "report"]);
        // 'x' lost its producer; it becomes a free input for the run.
        assert!(filtered.free_inputs().contains("x"));
    }

    #[test]
    fn test_filter_by_unmatched_tags_errors() {
        let pipeline = sample();
        let err = pipeline.filter_by_tags(&tag_set(&["ml"])).unwrap_err();
        assert!(err.to_string().contains("no node"));
    }

    #[test]
    fn test_from_nodes_downstream_closure() {
        let pipeline = sample();
        let sliced = pipeline.from_nodes(&["prep"]).unwrap();
        assert_eq!(sliced.node_names(), vec!["prep", "report"]);
    }

    #[test]
    fn test_to_nodes_upstream_closure() {
        let pipeline = sample();
        let sliced = pipeline.to_nodes(&["prep"]).unwrap();
        assert_eq!(sliced.node_names(), vec!["ingest", "prep"]);
    }

    #[test]
    fn test_slicing_unknown_node_errors() {
        let pipeline = sample();
        assert!(pipeline.from_nodes(&["nope"]).is_err());
    }

    #[test]
    fn test_edges_and_manifest() {
        let pipeline = sample();
        assert_eq!(
            pipeline.edges(),
            vec![
                ("ingest".to_string(), "prep".to_string()),
                ("prep".to_string(), "report".to_string()),
            ]
        );

        let manifest = pipeline.manifest();
        assert_eq!(manifest["name"], "sample");
        assert_eq!(manifest["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(manifest["edges"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_free_inputs_and_datasets() {
        let pipeline = sample();
        assert!(pipeline.free_inputs().is_empty());
        assert_eq!(pipeline.datasets(), tag_set(&["x", "y"]));
        assert_eq!(pipeline.tags(), tag_set(&["raw", "recsys"]));
    }
}
