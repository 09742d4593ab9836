#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Message,
    State,
    Merge,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Message => "message",
            NodeKind::State => "state",
            NodeKind::Merge => "merge",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "message" => Some(NodeKind::Message),
            "state" => Some(NodeKind::State),
            "merge" => Some(NodeKind::Merge),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    pub id: String,
    /// Content hash of the canvas snapshot taken at this point.
    pub artifact_snapshot: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePayload {
    pub id: String,
    pub merge_from: String,
    pub merge_summary: String,
    pub source_commit: String,
    /// Source-side node ids folded in by the merge. The last entry is the
    /// source ref's head at merge time.
    pub source_node_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_assistant_content: Option<String>,
}

/// Self-describing node content. The node's own id is embedded in every
/// variant so a serialized payload can travel without its row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodePayload {
    Message(MessagePayload),
    State(StatePayload),
    Merge(MergePayload),
}

impl NodePayload {
    pub fn id(&self) -> &str {
        match self {
            NodePayload::Message(payload) => &payload.id,
            NodePayload::State(payload) => &payload.id,
            NodePayload::Merge(payload) => &payload.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodePayload::Message(_) => NodeKind::Message,
            NodePayload::State(_) => NodeKind::State,
            NodePayload::Merge(_) => NodeKind::Merge,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            NodePayload::Message(payload) => Some(payload.role),
            NodePayload::State(_) | NodePayload::Merge(_) => None,
        }
    }

    /// Second parent of a merge node: the source head recorded at merge time.
    pub fn merge_source_head(&self) -> Option<&str> {
        match self {
            NodePayload::Merge(payload) => payload.source_node_ids.last().map(String::as_str),
            NodePayload::Message(_) | NodePayload::State(_) => None,
        }
    }
}

/// Caller-supplied content for a plain append. Merge nodes are only minted by
/// the merge operation, so they have no variant here.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeContent {
    Message {
        role: Role,
        content: String,
        raw_response: Option<Value>,
    },
    State {
        artifact_snapshot: String,
    },
}

impl NodeContent {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeContent::Message { .. } => NodeKind::Message,
            NodeContent::State { .. } => NodeKind::State,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            NodeContent::Message { role, .. } => Some(*role),
            NodeContent::State { .. } => None,
        }
    }

    pub fn into_payload(self, id: String) -> NodePayload {
        match self {
            NodeContent::Message {
                role,
                content,
                raw_response,
            } => NodePayload::Message(MessagePayload {
                id,
                role,
                content,
                raw_response,
            }),
            NodeContent::State { artifact_snapshot } => NodePayload::State(StatePayload {
                id,
                artifact_snapshot,
            }),
        }
    }
}

/// One node as observed on a ref's timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryNode {
    pub id: String,
    pub commit_id: String,
    /// Structural predecessor: the node carried by the commit's first parent.
    pub parent_id: Option<String>,
    pub created_on_ref: Option<String>,
    pub created_at_ms: i64,
    pub payload: NodePayload,
}

impl HistoryNode {
    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }
}

/// Oldest-first node list of a single ref.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefHistory {
    pub ref_name: String,
    pub nodes: Vec<HistoryNode>,
}
