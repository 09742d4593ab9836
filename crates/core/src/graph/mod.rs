#![forbid(unsafe_code)]

//! Graph builder.
//!
//! Reconstructs the conversation DAG from one or more ref histories. Nodes are
//! deduplicated by id (a node shared by several refs appears once), parents are
//! resolved from the structural predecessor plus, for merges, the recorded
//! source head, and the result is put into a stable oldest-first total order.
//!
//! Malformed input (dangling parents, cycles) never fails the build. It is
//! absorbed so the graph stays renderable, and each occurrence is reported in
//! [`Dag::warnings`].

mod order;
mod project;
mod resolve;

use crate::model::NodeKind;
use crate::model::RefHistory;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphMode {
    Full,
    Collapsed,
    Starred,
}

impl GraphMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphMode::Full => "full",
            GraphMode::Collapsed => "collapsed",
            GraphMode::Starred => "starred",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "full" => Some(GraphMode::Full),
            "collapsed" => Some(GraphMode::Collapsed),
            "starred" => Some(GraphMode::Starred),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DagParent {
    pub id: String,
    /// Nodes elided between this node and the parent (reduced projections only).
    pub hidden: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DagNode {
    pub id: String,
    pub kind: NodeKind,
    pub created_at_ms: i64,
    /// First ref the node was observed under.
    pub origin_ref: String,
    pub created_on_ref: Option<String>,
    /// Primary parent first, merge source second.
    pub parents: Vec<DagParent>,
}

impl DagNode {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphWarning {
    DanglingParent { node: String, parent: String },
    CycleBroken { nodes: Vec<String> },
    /// The same node id listed twice within one ref's history.
    DuplicateNode { node: String, ref_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dag {
    pub mode: GraphMode,
    /// Names of the input histories, in input order.
    pub refs: Vec<String>,
    /// Oldest-first; every parent precedes its children unless a cycle was broken.
    pub nodes: Vec<DagNode>,
    pub warnings: Vec<GraphWarning>,
}

impl Dag {
    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&DagNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    /// Ref the node was authored on. A node-carried name that is not one of
    /// [`Dag::refs`] (renamed since) falls back to where it was first seen.
    pub fn lane_ref<'a>(&self, node: &'a DagNode) -> &'a str {
        match node.created_on_ref.as_deref() {
            Some(name) if self.refs.iter().any(|known| known == name) => name,
            _ => &node.origin_ref,
        }
    }
}

pub struct GraphInput<'a> {
    pub histories: &'a [RefHistory],
    pub active_ref: &'a str,
    pub trunk_ref: &'a str,
    pub mode: GraphMode,
    pub starred: Option<&'a HashSet<String>>,
}

pub fn build_graph(input: GraphInput<'_>) -> Dag {
    let mut resolved = resolve::ResolvedGraph::from_histories(input.histories);
    let order = order::topological_order(&mut resolved);

    let nodes = match input.mode {
        GraphMode::Full => project::full(&resolved, &order),
        GraphMode::Collapsed => {
            let keep = project::collapsed_keep(
                &resolved,
                input.histories,
                input.active_ref,
                input.trunk_ref,
            );
            project::reduce(&resolved, &order, &keep)
        }
        GraphMode::Starred => {
            let empty = HashSet::new();
            let starred = input.starred.unwrap_or(&empty);
            let keep = project::starred_keep(
                &resolved,
                &order,
                input.histories,
                input.active_ref,
                input.trunk_ref,
                starred,
            );
            project::reduce(&resolved, &order, &keep)
        }
    };

    for warning in &resolved.warnings {
        tracing::warn!(?warning, "graph input absorbed malformed parent data");
    }

    Dag {
        mode: input.mode,
        refs: input
            .histories
            .iter()
            .map(|history| history.ref_name.clone())
            .collect(),
        nodes,
        warnings: resolved.warnings,
    }
}
