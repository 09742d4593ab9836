#![forbid(unsafe_code)]

use loom_core::graph::Dag;
use loom_core::layout::Layout;
use loom_core::model::{HistoryNode, MergePayload};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberRole {
    Owner,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(MemberRole::Owner),
            "member" => Some(MemberRole::Member),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectRow {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub default_ref: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRow {
    pub project_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefRow {
    pub name: String,
    pub tip_commit: Option<String>,
    /// Number of commit-order rows (the next ordinal).
    pub length: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRow {
    pub id: String,
    pub parent1: Option<String>,
    pub parent2: Option<String>,
    pub message: String,
    pub author: String,
    pub created_at_ms: i64,
}

/// What every node-producing mutation hands back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeCommit {
    pub ref_name: String,
    pub commit_id: String,
    pub node_id: String,
    pub ordinal: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendResult {
    pub commit: NodeCommit,
    /// Hash of the artifact snapshotted from the caller's draft, if any.
    pub artifact_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergeResult {
    pub commit: NodeCommit,
    pub source_commit: String,
    pub payload: MergePayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchResult {
    pub ref_name: String,
    pub tip_commit: Option<String>,
    /// Commit-order rows copied from the source ref.
    pub copied: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StarToggle {
    pub node_id: String,
    pub starred: bool,
    /// Full starred set after the toggle, sorted.
    pub stars: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftRow {
    pub ref_name: String,
    pub user_id: String,
    pub kind: String,
    pub content: String,
    pub content_hash: String,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactRow {
    pub seq: i64,
    pub commit_id: String,
    pub kind: String,
    pub content: String,
    pub content_hash: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Canvas {
    Draft(DraftRow),
    Artifact(ArtifactRow),
    None,
}

impl Canvas {
    pub fn content(&self) -> Option<&str> {
        match self {
            Canvas::Draft(draft) => Some(&draft.content),
            Canvas::Artifact(artifact) => Some(&artifact.content),
            Canvas::None => None,
        }
    }

    pub fn content_hash(&self) -> Option<&str> {
        match self {
            Canvas::Draft(draft) => Some(&draft.content_hash),
            Canvas::Artifact(artifact) => Some(&artifact.content_hash),
            Canvas::None => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub ordinal: i64,
    pub node: HistoryNode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryPage {
    /// Oldest-first.
    pub entries: Vec<HistoryEntry>,
    /// Pass as `before_ordinal` to fetch the preceding page.
    pub next_cursor: Option<i64>,
    pub has_more: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
    pub node: HistoryNode,
    pub commit: CommitRow,
    pub starred: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectGraph {
    pub dag: Dag,
    pub layout: Layout,
}
