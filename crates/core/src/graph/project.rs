#![forbid(unsafe_code)]

use super::resolve::ResolvedGraph;
use super::{DagNode, DagParent};
use crate::model::{NodeKind, RefHistory};
use std::collections::HashSet;

pub(super) fn full(graph: &ResolvedGraph, order: &[usize]) -> Vec<DagNode> {
    order
        .iter()
        .map(|&index| {
            let parents = graph.nodes[index]
                .parents
                .iter()
                .map(|&parent| DagParent {
                    id: graph.nodes[parent].id.clone(),
                    hidden: 0,
                })
                .collect();
            dag_node(graph, index, parents)
        })
        .collect()
}

/// Fork points, merges, every ref's first node and the active head.
pub(super) fn collapsed_keep(
    graph: &ResolvedGraph,
    histories: &[RefHistory],
    active_ref: &str,
    trunk_ref: &str,
) -> Vec<bool> {
    let known_refs: Vec<&str> = histories.iter().map(|h| h.ref_name.as_str()).collect();
    let mut keep = vec![false; graph.len()];

    for history in histories {
        if let Some(index) = first_index(graph, history) {
            keep[index] = true;
        }
    }
    if let Some(index) = head_index(graph, histories, active_ref) {
        keep[index] = true;
    }

    for (index, node) in graph.nodes.iter().enumerate() {
        if node.kind == NodeKind::Merge || node.parents.len() > 1 {
            keep[index] = true;
        }
        if graph.primary_children[index].len() > 1 {
            keep[index] = true;
        }

        let lane = graph.lane_ref(index, &known_refs);
        if let Some(parent) = node.primary {
            if graph.lane_ref(parent, &known_refs) != lane {
                // first node authored on a diverging ref, and where it forked
                keep[index] = true;
                keep[parent] = true;
            }
        }

        let continues_lane = graph.primary_children[index]
            .iter()
            .any(|&child| graph.lane_ref(child, &known_refs) == lane);
        if !continues_lane && lane != trunk_ref {
            // last node authored on a diverging ref
            keep[index] = true;
        }
    }

    keep
}

/// Starred nodes plus the trunk root and the active head.
pub(super) fn starred_keep(
    graph: &ResolvedGraph,
    order: &[usize],
    histories: &[RefHistory],
    active_ref: &str,
    trunk_ref: &str,
    starred: &HashSet<String>,
) -> Vec<bool> {
    let mut keep = vec![false; graph.len()];
    for id in starred {
        if let Some(&index) = graph.index.get(id) {
            keep[index] = true;
        }
    }

    let trunk_root = histories
        .iter()
        .find(|h| h.ref_name == trunk_ref)
        .and_then(|h| first_index(graph, h))
        .or_else(|| order.first().copied());
    if let Some(index) = trunk_root {
        keep[index] = true;
    }
    if let Some(index) = head_index(graph, histories, active_ref) {
        keep[index] = true;
    }

    keep
}

/// Projects the ordered graph onto the kept nodes. Each surviving parent link
/// is re-pointed at the nearest kept ancestor along the primary-parent chain
/// and annotated with the number of nodes skipped on the way.
pub(super) fn reduce(graph: &ResolvedGraph, order: &[usize], keep: &[bool]) -> Vec<DagNode> {
    let mut out = Vec::new();
    for &index in order {
        if !keep[index] {
            continue;
        }
        let mut parents: Vec<DagParent> = Vec::new();
        for &parent in &graph.nodes[index].parents {
            let Some((ancestor, hidden)) = nearest_kept(graph, keep, parent) else {
                continue;
            };
            if ancestor == index {
                continue;
            }
            let id = &graph.nodes[ancestor].id;
            if parents.iter().any(|existing| &existing.id == id) {
                continue;
            }
            parents.push(DagParent {
                id: id.clone(),
                hidden,
            });
        }
        out.push(dag_node(graph, index, parents));
    }
    out
}

fn nearest_kept(graph: &ResolvedGraph, keep: &[bool], start: usize) -> Option<(usize, usize)> {
    let mut current = start;
    let mut hidden = 0usize;
    let mut seen = HashSet::new();
    loop {
        if keep[current] {
            return Some((current, hidden));
        }
        if !seen.insert(current) {
            return None;
        }
        hidden += 1;
        current = graph.nodes[current].primary?;
    }
}

fn first_index(graph: &ResolvedGraph, history: &RefHistory) -> Option<usize> {
    history
        .nodes
        .first()
        .and_then(|node| graph.index.get(&node.id).copied())
}

fn head_index(graph: &ResolvedGraph, histories: &[RefHistory], active_ref: &str) -> Option<usize> {
    histories
        .iter()
        .find(|h| h.ref_name == active_ref)
        .and_then(|h| h.nodes.last())
        .and_then(|node| graph.index.get(&node.id).copied())
}

fn dag_node(graph: &ResolvedGraph, index: usize, parents: Vec<DagParent>) -> DagNode {
    let node = &graph.nodes[index];
    DagNode {
        id: node.id.clone(),
        kind: node.kind,
        created_at_ms: node.created_at_ms,
        origin_ref: node.origin_ref.clone(),
        created_on_ref: node.created_on_ref.clone(),
        parents,
    }
}
