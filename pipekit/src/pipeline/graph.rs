//! Dependency-graph algorithms over the dataset-induced node graph.
//!
//! Edges are never declared directly: node `a` depends on node `b`
//! exactly when one of `b`'s outputs appears among `a`'s inputs.

use crate::errors::{CycleDetectedError, PipelineBuildError};
use crate::node::Node;
use std::collections::{BTreeSet, HashMap};

/// Maps each output dataset name to the index of its producing node.
///
/// # Errors
///
/// Returns an error if two nodes declare the same output dataset
/// (single-writer invariant).
pub fn build_producers(nodes: &[Node]) -> Result<HashMap<String, usize>, PipelineBuildError> {
    let mut producers: HashMap<String, usize> = HashMap::new();

    for (index, node) in nodes.iter().enumerate() {
        for output in &node.outputs {
            if let Some(&existing) = producers.get(output) {
                return Err(PipelineBuildError::new(format!(
                    "output '{}' is declared by both node '{}' and node '{}'",
                    output, nodes[existing].name, node.name
                ))
                .with_nodes(vec![
                    nodes[existing].name.clone(),
                    node.name.clone(),
                ]));
            }
            producers.insert(output.clone(), index);
        }
    }

    Ok(producers)
}

/// Computes, for each node, the set of in-pipeline nodes it depends on.
///
/// Inputs without an in-pipeline producer are left unresolved here;
/// they are satisfied from the catalog at run time.
#[must_use]
pub fn node_dependencies(
    nodes: &[Node],
    producers: &HashMap<String, usize>,
) -> Vec<BTreeSet<usize>> {
    nodes
        .iter()
        .map(|node| {
            node.inputs
                .iter()
                .filter_map(|input| producers.get(input).copied())
                .collect()
        })
        .collect()
}

/// Topologically sorts the nodes, visiting in registration order so
/// independent nodes keep a deterministic relative order.
///
/// # Errors
///
/// Returns an error naming the cycle path if the graph is cyclic.
pub fn topological_order(
    nodes: &[Node],
    dependencies: &[BTreeSet<usize>],
) -> Result<Vec<usize>, CycleDetectedError> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut visited = vec![false; nodes.len()];
    let mut on_stack = vec![false; nodes.len()];
    let mut path = Vec::new();

    for start in 0..nodes.len() {
        if !visited[start] {
            visit(
                start,
                nodes,
                dependencies,
                &mut visited,
                &mut on_stack,
                &mut path,
                &mut order,
            )?;
        }
    }

    Ok(order)
}

fn visit(
    index: usize,
    nodes: &[Node],
    dependencies: &[BTreeSet<usize>],
    visited: &mut [bool],
    on_stack: &mut [bool],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), CycleDetectedError> {
    on_stack[index] = true;
    path.push(index);

    for &dep in &dependencies[index] {
        if on_stack[dep] {
            let cycle_start = path.iter().position(|&n| n == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[cycle_start..]
                .iter()
                .map(|&n| nodes[n].name.clone())
                .collect();
            cycle.push(nodes[dep].name.clone());
            return Err(CycleDetectedError::new(cycle));
        }
        if !visited[dep] {
            visit(dep, nodes, dependencies, visited, on_stack, path, order)?;
        }
    }

    path.pop();
    on_stack[index] = false;
    visited[index] = true;
    order.push(index);
    Ok(())
}
