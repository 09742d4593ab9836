#![forbid(unsafe_code)]

use super::{LaneEdge, LaneNode, LaneSegment, LaneTrack, Layout, Point, edge_kind, hidden_count};
use crate::graph::Dag;
use std::collections::HashMap;

/// A column reserved on some row by a track heading for `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Reservation {
    to: Option<usize>,
    track: usize,
}

#[derive(Debug)]
struct Vertex {
    /// Parent rows; `None` for a parent outside the DAG.
    parents: Vec<Option<usize>>,
    hidden: Vec<usize>,
    next_parent: usize,
    track: Option<usize>,
    lane: usize,
    next_lane: usize,
    reserved: Vec<Option<Reservation>>,
}

impl Vertex {
    fn pending_parent(&self) -> Option<Option<usize>> {
        self.parents.get(self.next_parent).copied()
    }

    fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    fn join_track(&mut self, track: usize, lane: usize) {
        if self.track.is_none() {
            self.track = Some(track);
            self.lane = lane;
        }
    }

    /// Only the next free column can be taken; anything else is already held.
    fn reserve(&mut self, lane: usize, to: Option<usize>, track: usize) {
        if lane != self.next_lane {
            return;
        }
        self.next_lane = lane + 1;
        if self.reserved.len() <= lane {
            self.reserved.resize(lane + 1, None);
        }
        self.reserved[lane] = Some(Reservation { to, track });
    }

    fn lane_towards(&self, to: usize, track: usize) -> Option<usize> {
        let wanted = Reservation {
            to: Some(to),
            track,
        };
        self.reserved.iter().position(|slot| *slot == Some(wanted))
    }
}

#[derive(Debug)]
struct Track {
    colour: usize,
    end_row: usize,
    segments: Vec<LaneSegment>,
}

/// The routed path of one parent edge.
#[derive(Debug)]
struct Route {
    child: usize,
    slot: usize,
    points: Vec<Point>,
    locked_first: Option<bool>,
}

impl Route {
    fn begin(child: usize, slot: usize, at: Point) -> Self {
        Route {
            child,
            slot,
            points: vec![at],
            locked_first: None,
        }
    }

    fn extend(&mut self, to: Point, locked: bool) {
        self.points.push(to);
        self.locked_first.get_or_insert(locked);
    }
}

pub(super) struct Engine {
    vertices: Vec<Vertex>,
    tracks: Vec<Track>,
    /// Row at which each palette slot's latest track ended.
    palette: Vec<usize>,
    routes: Vec<Route>,
}

impl Engine {
    pub fn new(dag: &Dag) -> Self {
        let count = dag.nodes.len();
        let row_of: HashMap<&str, usize> = dag
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.as_str(), count - 1 - index))
            .collect();

        let vertices = dag
            .nodes
            .iter()
            .rev()
            .map(|node| Vertex {
                parents: node
                    .parents
                    .iter()
                    .map(|parent| row_of.get(parent.id.as_str()).copied())
                    .collect(),
                hidden: node.parents.iter().map(|parent| parent.hidden).collect(),
                next_parent: 0,
                track: None,
                lane: 0,
                next_lane: 0,
                reserved: Vec::new(),
            })
            .collect();

        Engine {
            vertices,
            tracks: Vec::new(),
            palette: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Every settled step either advances the row cursor, places a vertex or
    /// resolves one parent, so a terminating run stays well inside this.
    pub fn budget(&self) -> usize {
        let parents: usize = self.vertices.iter().map(|v| v.parents.len()).sum();
        2 * (self.vertices.len() + parents) + 8
    }

    /// Returns `None` when the budget runs out before every vertex settles.
    pub fn run(mut self, budget: usize) -> Option<Self> {
        let mut row = 0;
        let mut steps = 0usize;
        while row < self.vertices.len() {
            steps += 1;
            if steps > budget {
                return None;
            }
            let vertex = &self.vertices[row];
            if vertex.pending_parent().is_some() || vertex.track.is_none() {
                self.determine_path(row);
            } else {
                row += 1;
            }
        }
        Some(self)
    }

    fn point(&self, row: usize) -> Point {
        Point {
            lane: self.vertices[row].lane,
            row,
        }
    }

    fn next_point(&self, row: usize) -> Point {
        Point {
            lane: self.vertices[row].next_lane,
            row,
        }
    }

    fn determine_path(&mut self, start: usize) {
        let vertex = &self.vertices[start];
        if let Some(Some(parent)) = vertex.pending_parent() {
            if vertex.is_merge() && vertex.track.is_some() {
                if let Some(track) = self.vertices[parent].track {
                    self.route_to_rendezvous(start, parent, track);
                    return;
                }
            }
        }
        self.walk_new_track(start);
    }

    /// Extends the parent's track from `start` until some row already holds a
    /// column connecting to `parent` on that track.
    fn route_to_rendezvous(&mut self, start: usize, parent: usize, track: usize) {
        let slot = self.vertices[start].next_parent;
        let mut last = self.point(start);
        let mut route = Route::begin(start, slot, last);

        for row in start + 1..self.vertices.len() {
            let found = self.vertices[row].lane_towards(parent, track);
            let current = match found {
                Some(lane) => Point { lane, row },
                None => self.next_point(row),
            };
            let locked = if found.is_none() && row != parent {
                last.lane < current.lane
            } else {
                true
            };
            self.tracks[track].segments.push(LaneSegment {
                from: last,
                to: current,
                locked_first: locked,
            });
            route.extend(current, locked);
            self.vertices[row].reserve(current.lane, Some(parent), track);
            last = current;

            if found.is_some() {
                self.vertices[start].next_parent += 1;
                self.routes.push(route);
                break;
            }
        }
    }

    fn walk_new_track(&mut self, start: usize) {
        let count = self.vertices.len();
        let colour = self.claim_colour(start);
        let track = self.tracks.len();
        self.tracks.push(Track {
            colour,
            end_row: start,
            segments: Vec::new(),
        });

        let mut last = if self.vertices[start].track.is_none() {
            self.next_point(start)
        } else {
            self.point(start)
        };
        let mut vertex = start;
        let mut parent = self.vertices[start].pending_parent();
        self.vertices[start].join_track(track, last.lane);
        self.vertices[start].reserve(last.lane, Some(start), track);

        let mut row = start;
        if parent.is_some() {
            row += 1;
            let mut route = Route::begin(vertex, self.vertices[vertex].next_parent, last);
            while row < count {
                let target = parent.flatten();
                let reached = target == Some(row);
                let current = if reached && self.vertices[row].track.is_some() {
                    self.point(row)
                } else {
                    self.next_point(row)
                };
                let locked = last.lane < current.lane;
                self.tracks[track].segments.push(LaneSegment {
                    from: last,
                    to: current,
                    locked_first: locked,
                });
                route.extend(current, locked);
                self.vertices[row].reserve(current.lane, target, track);
                last = current;

                if reached {
                    self.vertices[vertex].next_parent += 1;
                    let finished = std::mem::replace(
                        &mut route,
                        Route::begin(row, self.vertices[row].next_parent, current),
                    );
                    self.routes.push(finished);

                    let already_laned = self.vertices[row].track.is_some();
                    self.vertices[row].join_track(track, current.lane);
                    vertex = row;
                    parent = self.vertices[row].pending_parent();
                    if parent.is_none() || already_laned {
                        break;
                    }
                }
                row += 1;
            }
            if row == count && parent == Some(None) {
                // parent lies outside the DAG; the track simply runs off the end
                self.vertices[vertex].next_parent += 1;
            }
        }

        let end_row = row.min(count.saturating_sub(1));
        self.tracks[track].end_row = end_row;
        self.palette[colour] = end_row;
    }

    /// Lowest palette slot whose previous track ended at or above `row`.
    fn claim_colour(&mut self, row: usize) -> usize {
        if let Some(slot) = self.palette.iter().position(|&end| end <= row) {
            return slot;
        }
        self.palette.push(row);
        self.palette.len() - 1
    }

    pub fn into_layout(mut self, dag: &Dag) -> Layout {
        let count = self.vertices.len();
        let id_at = |row: usize| dag.nodes[count - 1 - row].id.clone();

        let nodes: Vec<LaneNode> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(row, vertex)| LaneNode {
                id: id_at(row),
                lane: vertex.lane,
                row,
                colour: vertex
                    .track
                    .map(|track| self.tracks[track].colour)
                    .unwrap_or_default(),
                label_lane: vertex.next_lane.max(vertex.lane + 1),
            })
            .collect();

        self.routes.sort_by_key(|route| (route.child, route.slot));
        let edges = self
            .routes
            .into_iter()
            .filter_map(|route| {
                let vertex = &self.vertices[route.child];
                let parent = vertex.parents.get(route.slot).copied().flatten()?;
                let hidden = vertex.hidden.get(route.slot).copied().unwrap_or(0);
                Some(LaneEdge {
                    from: id_at(route.child),
                    to: id_at(parent),
                    lane_kind: edge_kind(&route.points),
                    locked_first_segment: route.locked_first.unwrap_or(false),
                    hidden_count: hidden_count(hidden),
                    route: route.points,
                })
            })
            .collect();

        let lane_count = nodes.iter().map(|node| node.label_lane).max().unwrap_or(0);
        let tracks = self
            .tracks
            .into_iter()
            .map(|track| LaneTrack {
                colour: track.colour,
                end_row: track.end_row,
                segments: track.segments,
            })
            .collect();

        Layout {
            nodes,
            edges,
            tracks,
            lane_count,
            fallback: false,
        }
    }
}
