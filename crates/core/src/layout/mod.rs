#![forbid(unsafe_code)]

//! Layout engine.
//!
//! Assigns every node of a [`Dag`] a lane (column) and a row, and routes each
//! parent edge through the grid. Rows run newest-first: row 0 is the newest
//! node, so every parent sits on a larger row than its children.
//!
//! Lanes are claimed by tracks. A track starts at a node without a lane and is
//! walked down to its first parent, handed to that parent, and continued until
//! it meets a node that already has a lane. Merge edges whose source already
//! owns a track are routed to a rendezvous with that track instead. Tracks take
//! their colour from a recycled palette.
//!
//! The walk is bounded by an iteration budget. Input it cannot settle (cycles
//! that survived graph building, hand-built DAGs) falls back to one fixed lane
//! per ref, flagged by [`Layout::fallback`].

mod engine;
mod fallback;

use crate::graph::Dag;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub lane: usize,
    pub row: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneKind {
    /// Both ends and every waypoint in one lane.
    Straight,
    /// Both ends in one lane, detouring around reserved columns in between.
    Angular,
    /// Ends in different lanes.
    Curved,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneNode {
    pub id: String,
    pub lane: usize,
    pub row: usize,
    pub colour: usize,
    /// First column right of everything reserved on this row.
    pub label_lane: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneEdge {
    /// Child node id.
    pub from: String,
    /// Parent node id.
    pub to: String,
    pub lane_kind: LaneKind,
    /// The first segment keeps the child's column before bending towards the
    /// parent, rather than bending immediately.
    pub locked_first_segment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_count: Option<usize>,
    pub route: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneSegment {
    pub from: Point,
    pub to: Point,
    pub locked_first: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneTrack {
    pub colour: usize,
    pub end_row: usize,
    pub segments: Vec<LaneSegment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Ordered by row.
    pub nodes: Vec<LaneNode>,
    pub edges: Vec<LaneEdge>,
    pub tracks: Vec<LaneTrack>,
    pub lane_count: usize,
    pub fallback: bool,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&LaneNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&LaneEdge> {
        self.edges
            .iter()
            .find(|edge| edge.from == from && edge.to == to)
    }
}

fn edge_kind(route: &[Point]) -> LaneKind {
    match (route.first(), route.last()) {
        (Some(first), Some(last)) if first.lane == last.lane => {
            if route.iter().all(|point| point.lane == first.lane) {
                LaneKind::Straight
            } else {
                LaneKind::Angular
            }
        }
        (Some(_), Some(_)) => LaneKind::Curved,
        _ => LaneKind::Straight,
    }
}

fn hidden_count(hidden: usize) -> Option<usize> {
    (hidden > 0).then_some(hidden)
}

pub fn layout(dag: &Dag, active_ref: &str, trunk_ref: &str) -> Layout {
    let engine = engine::Engine::new(dag);
    let budget = engine.budget();
    match engine.run(budget) {
        Some(done) => done.into_layout(dag),
        None => {
            tracing::warn!(
                nodes = dag.nodes.len(),
                budget,
                "lane layout did not converge, falling back to one lane per ref"
            );
            fallback::fixed_lanes(dag, active_ref, trunk_ref)
        }
    }
}
