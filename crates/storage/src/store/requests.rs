#![forbid(unsafe_code)]

use loom_core::graph::GraphMode;
use loom_core::model::NodeContent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateProjectRequest {
    pub user_id: String,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddMemberRequest {
    pub user_id: String,
    pub project_id: String,
    pub member_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRefRequest {
    pub user_id: String,
    pub project_id: String,
    pub ref_name: String,
    /// Succeed without changes when the ref is already there.
    pub if_absent: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRefsRequest {
    pub user_id: String,
    pub project_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppendNodeRequest {
    pub user_id: String,
    pub project_id: String,
    pub ref_name: String,
    pub content: NodeContent,
    pub message: Option<String>,
    /// Create the ref (empty) first when it does not exist yet.
    pub ensure_ref: bool,
    /// Snapshot the caller's draft as an artifact at the new commit.
    pub commit_draft: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeRequest {
    pub user_id: String,
    pub project_id: String,
    pub target_ref: String,
    pub source_ref: String,
    pub merge_summary: String,
    /// Derived from the source ref when not given.
    pub source_node_ids: Option<Vec<String>>,
    pub canvas_diff: Option<String>,
    pub merged_assistant_content: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchFromRefRequest {
    pub user_id: String,
    pub project_id: String,
    pub from_ref: String,
    pub new_ref: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchFromNodeRequest {
    pub user_id: String,
    pub project_id: String,
    pub source_ref: String,
    pub new_ref: String,
    pub node_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameRefRequest {
    pub user_id: String,
    pub project_id: String,
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToggleStarRequest {
    pub user_id: String,
    pub project_id: String,
    pub node_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListStarsRequest {
    pub user_id: String,
    pub project_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveDraftRequest {
    pub user_id: String,
    pub project_id: String,
    pub ref_name: String,
    pub kind: String,
    pub content: String,
    /// Hash of the draft the caller edited; a different stored hash is a conflict.
    pub base_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetCanvasRequest {
    pub user_id: String,
    pub project_id: String,
    pub ref_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRequest {
    pub user_id: String,
    pub project_id: String,
    pub ref_name: String,
    pub limit: usize,
    /// Only ordinals strictly below this one.
    pub before_ordinal: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShowNodeRequest {
    pub user_id: String,
    pub project_id: String,
    pub node_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefHistoriesRequest {
    pub user_id: String,
    pub project_id: String,
    /// Every ref of the project when empty.
    pub refs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectGraphRequest {
    pub user_id: String,
    pub project_id: String,
    pub active_ref: String,
    /// Defaults to the project's default ref.
    pub trunk_ref: Option<String>,
    pub mode: GraphMode,
}
