#![forbid(unsafe_code)]

use super::{
    LaneEdge, LaneNode, LaneSegment, LaneTrack, Layout, Point, edge_kind, hidden_count,
};
use crate::graph::Dag;
use std::collections::HashMap;

/// One fixed lane per ref: trunk first, then the active ref, then every other
/// ref in order of first appearance. Rows stay newest-first.
pub(super) fn fixed_lanes(dag: &Dag, active_ref: &str, trunk_ref: &str) -> Layout {
    let mut lanes: HashMap<&str, usize> = HashMap::new();
    lanes.insert(trunk_ref, 0);
    if active_ref != trunk_ref {
        lanes.insert(active_ref, 1);
    }
    for node in &dag.nodes {
        let next = lanes.len();
        lanes.entry(dag.lane_ref(node)).or_insert(next);
    }

    let count = dag.nodes.len();
    let mut placed: HashMap<&str, Point> = HashMap::new();
    let mut nodes = Vec::with_capacity(count);
    for (row, node) in dag.nodes.iter().rev().enumerate() {
        let lane = lanes.get(dag.lane_ref(node)).copied().unwrap_or_default();
        placed.insert(node.id.as_str(), Point { lane, row });
        nodes.push(LaneNode {
            id: node.id.clone(),
            lane,
            row,
            colour: lane,
            label_lane: lane + 1,
        });
    }

    let lane_count = lanes.len();
    let mut tracks: Vec<LaneTrack> = (0..lane_count)
        .map(|lane| LaneTrack {
            colour: lane,
            end_row: 0,
            segments: Vec::new(),
        })
        .collect();

    let mut edges = Vec::new();
    for node in dag.nodes.iter().rev() {
        let Some(&from) = placed.get(node.id.as_str()) else {
            continue;
        };
        for parent in &node.parents {
            let Some(&to) = placed.get(parent.id.as_str()) else {
                continue;
            };
            let locked = from.lane < to.lane;
            if let Some(track) = tracks.get_mut(from.lane) {
                track.segments.push(LaneSegment {
                    from,
                    to,
                    locked_first: locked,
                });
                track.end_row = track.end_row.max(to.row);
            }
            let route = vec![from, to];
            edges.push(LaneEdge {
                from: node.id.clone(),
                to: parent.id.clone(),
                lane_kind: edge_kind(&route),
                locked_first_segment: locked,
                hidden_count: hidden_count(parent.hidden),
                route,
            });
        }
    }

    Layout {
        nodes,
        edges,
        tracks,
        lane_count,
        fallback: true,
    }
}
