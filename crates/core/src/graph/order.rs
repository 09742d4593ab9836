#![forbid(unsafe_code)]

use super::GraphWarning;
use super::resolve::ResolvedGraph;
use std::collections::BTreeSet;

/// Kahn's algorithm over parent -> child links. The ready set is ordered by
/// `(timestamp, id)`; nodes that never become ready (cycles) are appended in
/// the same order, so every input node appears exactly once.
pub(super) fn topological_order(graph: &mut ResolvedGraph) -> Vec<usize> {
    let count = graph.len();
    let mut in_degree: Vec<usize> = graph.nodes.iter().map(|node| node.parents.len()).collect();
    let key = |index: usize| {
        let node = &graph.nodes[index];
        (node.created_at_ms, node.id.clone(), index)
    };

    let mut ready: BTreeSet<(i64, String, usize)> = (0..count)
        .filter(|&index| in_degree[index] == 0)
        .map(key)
        .collect();
    let mut order = Vec::with_capacity(count);
    let mut placed = vec![false; count];

    while let Some(next) = ready.pop_first() {
        let index = next.2;
        order.push(index);
        placed[index] = true;
        for &child in &graph.children[index] {
            in_degree[child] = in_degree[child].saturating_sub(1);
            if in_degree[child] == 0 && !placed[child] {
                ready.insert(key(child));
            }
        }
    }

    if order.len() < count {
        let mut leftover: Vec<(i64, String, usize)> = (0..count)
            .filter(|&index| !placed[index])
            .map(key)
            .collect();
        leftover.sort();
        let ids = leftover.iter().map(|entry| entry.1.clone()).collect();
        order.extend(leftover.into_iter().map(|entry| entry.2));
        graph.warnings.push(GraphWarning::CycleBroken { nodes: ids });
    }

    order
}
