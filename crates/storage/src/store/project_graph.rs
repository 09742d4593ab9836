#![forbid(unsafe_code)]

use super::history::{ref_history_tx, ref_names_tx};
use super::projects::project_row_tx;
use super::stars::starred_ids_tx;
use super::*;
use loom_core::graph::{GraphInput, GraphMode, build_graph};
use loom_core::layout::layout;
use std::collections::HashSet;

impl SqliteStore {
    /// Reads every ref of the project, builds the requested projection and
    /// lays it out.
    pub fn project_graph(
        &mut self,
        request: ProjectGraphRequest,
    ) -> Result<ProjectGraph, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        let project = project_row_tx(&tx, &caller.project)?
            .ok_or_else(|| StoreError::UnknownProject(caller.project.clone()))?;
        let active_ref = canonicalize_ref(&request.active_ref)?;
        let trunk_ref = match request.trunk_ref.as_deref() {
            Some(name) => canonicalize_ref(name)?,
            None => project.default_ref,
        };
        ref_state_tx(&tx, &caller.project, &active_ref)?;

        // Trunk first, then the active ref: the graph keeps the first ref a
        // node was seen on as its lane.
        let mut names = ref_names_tx(&tx, &caller.project)?;
        names.sort_by_key(|name| {
            if *name == trunk_ref {
                0
            } else if *name == active_ref {
                1
            } else {
                2
            }
        });
        let mut histories = Vec::with_capacity(names.len());
        for name in &names {
            histories.push(ref_history_tx(&tx, &caller.project, name)?);
        }
        let starred: HashSet<String> = match request.mode {
            GraphMode::Starred => starred_ids_tx(&tx, &caller.project)?.into_iter().collect(),
            GraphMode::Full | GraphMode::Collapsed => HashSet::new(),
        };
        tx.commit()?;

        let dag = build_graph(GraphInput {
            histories: &histories,
            active_ref: &active_ref,
            trunk_ref: &trunk_ref,
            mode: request.mode,
            starred: Some(&starred),
        });
        let layout = layout(&dag, &active_ref, &trunk_ref);
        tracing::debug!(
            project = %caller.project,
            mode = ?request.mode,
            nodes = dag.nodes.len(),
            lanes = layout.lane_count,
            fallback = layout.fallback,
            "project graph built"
        );
        Ok(ProjectGraph { dag, layout })
    }
}
