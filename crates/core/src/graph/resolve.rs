#![forbid(unsafe_code)]

use super::GraphWarning;
use crate::model::{HistoryNode, NodeKind, RefHistory};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub(super) struct ResolvedNode {
    pub id: String,
    pub kind: NodeKind,
    pub created_at_ms: i64,
    pub origin_ref: String,
    pub created_on_ref: Option<String>,
    /// Index of the structural predecessor, when it is part of the input.
    pub primary: Option<usize>,
    /// Resolved parents, primary first.
    pub parents: Vec<usize>,
}

#[derive(Debug, Default)]
pub(super) struct ResolvedGraph {
    pub nodes: Vec<ResolvedNode>,
    pub index: HashMap<String, usize>,
    /// Children reached through any parent link.
    pub children: Vec<Vec<usize>>,
    /// Children reached through the primary parent link only.
    pub primary_children: Vec<Vec<usize>>,
    pub warnings: Vec<GraphWarning>,
}

impl ResolvedGraph {
    pub fn from_histories(histories: &[RefHistory]) -> Self {
        let mut graph = ResolvedGraph::default();
        let mut raw: Vec<&HistoryNode> = Vec::new();

        for history in histories {
            let mut seen_here: HashSet<&str> = HashSet::new();
            for node in &history.nodes {
                if !seen_here.insert(node.id.as_str()) {
                    graph.warnings.push(GraphWarning::DuplicateNode {
                        node: node.id.clone(),
                        ref_name: history.ref_name.clone(),
                    });
                    continue;
                }
                if graph.index.contains_key(&node.id) {
                    continue;
                }
                graph.index.insert(node.id.clone(), graph.nodes.len());
                graph.nodes.push(ResolvedNode {
                    id: node.id.clone(),
                    kind: node.kind(),
                    created_at_ms: node.created_at_ms,
                    origin_ref: history.ref_name.clone(),
                    created_on_ref: node.created_on_ref.clone(),
                    primary: None,
                    parents: Vec::new(),
                });
                raw.push(node);
            }
        }

        let count = graph.nodes.len();
        graph.children = vec![Vec::new(); count];
        graph.primary_children = vec![Vec::new(); count];

        for (child, node) in raw.into_iter().enumerate() {
            let primary = node
                .parent_id
                .as_deref()
                .and_then(|parent| graph.link(child, parent));
            graph.nodes[child].primary = primary;
            if let Some(parent) = primary {
                graph.primary_children[parent].push(child);
            }

            if let Some(source_head) = node.payload.merge_source_head() {
                if node.parent_id.as_deref() != Some(source_head) {
                    graph.link(child, source_head);
                }
            }
        }

        graph
    }

    fn link(&mut self, child: usize, parent_id: &str) -> Option<usize> {
        let Some(&parent) = self.index.get(parent_id) else {
            self.warnings.push(GraphWarning::DanglingParent {
                node: self.nodes[child].id.clone(),
                parent: parent_id.to_string(),
            });
            return None;
        };
        if parent == child {
            self.warnings.push(GraphWarning::CycleBroken {
                nodes: vec![self.nodes[child].id.clone()],
            });
            return None;
        }
        if self.nodes[child].parents.contains(&parent) {
            return None;
        }
        self.nodes[child].parents.push(parent);
        self.children[parent].push(child);
        Some(parent)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Ref a node was authored on. A node-carried ref that is not among the
    /// input histories (renamed since) falls back to the origin ref.
    pub fn lane_ref<'a>(&'a self, index: usize, known_refs: &[&str]) -> &'a str {
        let node = &self.nodes[index];
        match node.created_on_ref.as_deref() {
            Some(name) if known_refs.contains(&name) => name,
            _ => &node.origin_ref,
        }
    }
}
