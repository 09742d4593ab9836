#![forbid(unsafe_code)]

use crate::CliError;
use crate::cli::Command;
use crate::render;
use loom_storage::*;
use serde_json::{Value, json};

pub(crate) fn run(store: &mut SqliteStore, user: &str, command: Command) -> Result<Value, CliError> {
    let user_id = user.to_string();

    let out = match command {
        Command::ProjectCreate {
            project,
            name,
            description,
        } => render::project(&store.create_project(CreateProjectRequest {
            user_id,
            project_id: project,
            name,
            description,
        })?),
        Command::MemberAdd { project, member } => render::member(&store.add_member(AddMemberRequest {
            user_id,
            project_id: project,
            member_id: member,
        })?),
        Command::Members { project } => Value::Array(
            store
                .list_members(&user_id, &project)?
                .iter()
                .map(render::member)
                .collect(),
        ),
        Command::RefCreate {
            project,
            ref_name,
            if_absent,
        } => render::ref_row(&store.create_ref(CreateRefRequest {
            user_id,
            project_id: project,
            ref_name,
            if_absent,
        })?),
        Command::Refs { project } => Value::Array(
            store
                .list_refs(ListRefsRequest {
                    user_id,
                    project_id: project,
                })?
                .iter()
                .map(render::ref_row)
                .collect(),
        ),
        Command::Append {
            project,
            ref_name,
            content,
            message,
            ensure_ref,
            commit_draft,
        } => render::appended(&store.append_node(AppendNodeRequest {
            user_id,
            project_id: project,
            ref_name,
            content: content.into_content(),
            message,
            ensure_ref,
            commit_draft,
        })?),
        Command::Merge {
            project,
            target,
            source,
            summary,
            source_nodes,
            canvas_diff,
            merged_content,
            message,
        } => render::merged(&store.merge(MergeRequest {
            user_id,
            project_id: project,
            target_ref: target,
            source_ref: source,
            merge_summary: summary,
            source_node_ids: source_nodes.map(node_ids),
            canvas_diff,
            merged_assistant_content: merged_content,
            message,
        })?)?,
        Command::Branch { project, from, new } => {
            render::branched(&store.branch_from_ref(BranchFromRefRequest {
                user_id,
                project_id: project,
                from_ref: from,
                new_ref: new,
            })?)
        }
        Command::BranchAt {
            project,
            ref_name,
            node,
            new,
        } => render::branched(&store.branch_from_node(BranchFromNodeRequest {
            user_id,
            project_id: project,
            source_ref: ref_name,
            new_ref: new,
            node_id: node,
        })?),
        Command::Rename { project, from, to } => render::ref_row(&store.rename_ref(RenameRefRequest {
            user_id,
            project_id: project,
            from,
            to,
        })?),
        Command::Star { project, node } => render::star(&store.toggle_star(ToggleStarRequest {
            user_id,
            project_id: project,
            node_id: node,
        })?),
        Command::Stars { project } => json!(store.list_stars(ListStarsRequest {
            user_id,
            project_id: project,
        })?),
        Command::DraftSave {
            project,
            ref_name,
            kind,
            content,
            base_hash,
        } => render::draft(&store.save_draft(SaveDraftRequest {
            user_id,
            project_id: project,
            ref_name,
            kind,
            content,
            base_hash,
        })?),
        Command::Canvas { project, ref_name } => render::canvas(&store.get_canvas(GetCanvasRequest {
            user_id,
            project_id: project,
            ref_name,
        })?),
        Command::History {
            project,
            ref_name,
            limit,
            before,
        } => render::history(&store.get_history(HistoryRequest {
            user_id,
            project_id: project,
            ref_name,
            limit,
            before_ordinal: before,
        })?)?,
        Command::Show { project, node } => render::node_record(&store.show_node(ShowNodeRequest {
            user_id,
            project_id: project,
            node_id: node,
        })?)?,
        Command::Graph {
            project,
            active,
            trunk,
            mode,
        } => {
            let graph = store.project_graph(ProjectGraphRequest {
                user_id,
                project_id: project,
                active_ref: active,
                trunk_ref: trunk,
                mode,
            })?;
            json!({
                "dag": serde_json::to_value(&graph.dag)?,
                "layout": serde_json::to_value(&graph.layout)?,
            })
        }
    };
    Ok(out)
}

/// Trims comma-separated node ids and drops blank entries.
fn node_ids(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}
