#![forbid(unsafe_code)]

use loom_storage::{
    AppendResult, BranchResult, Canvas, DraftRow, HistoryPage, MemberRow, MergeResult, NodeCommit,
    NodeRecord, ProjectRow, RefRow, StarToggle, StoreError,
};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub(crate) fn ts_ms_to_rfc3339(ts_ms: i64) -> String {
    let nanos = i128::from(ts_ms) * 1_000_000;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub(crate) fn error(code: &str, message: &str, retryable: bool) -> Value {
    json!({ "error": { "code": code, "message": message, "retryable": retryable } })
}

pub(crate) fn store_error(err: &StoreError) -> Value {
    error(err.code(), &err.to_string(), err.is_retryable())
}

pub(crate) fn project(row: &ProjectRow) -> Value {
    json!({
        "id": row.id,
        "owner": row.owner,
        "name": row.name,
        "description": row.description,
        "defaultRef": row.default_ref,
        "createdAt": ts_ms_to_rfc3339(row.created_at_ms),
    })
}

pub(crate) fn member(row: &MemberRow) -> Value {
    json!({
        "projectId": row.project_id,
        "userId": row.user_id,
        "role": row.role.as_str(),
        "createdAt": ts_ms_to_rfc3339(row.created_at_ms),
    })
}

pub(crate) fn ref_row(row: &RefRow) -> Value {
    json!({
        "name": row.name,
        "tipCommit": row.tip_commit,
        "length": row.length,
        "createdAt": ts_ms_to_rfc3339(row.created_at_ms),
        "updatedAt": ts_ms_to_rfc3339(row.updated_at_ms),
    })
}

fn node_commit(commit: &NodeCommit) -> Value {
    json!({
        "ref": commit.ref_name,
        "commitId": commit.commit_id,
        "nodeId": commit.node_id,
        "ordinal": commit.ordinal,
    })
}

pub(crate) fn appended(result: &AppendResult) -> Value {
    let mut out = node_commit(&result.commit);
    out["artifactHash"] = json!(result.artifact_hash);
    out
}

pub(crate) fn merged(result: &MergeResult) -> Result<Value, serde_json::Error> {
    let mut out = node_commit(&result.commit);
    out["sourceCommit"] = json!(result.source_commit);
    out["payload"] = serde_json::to_value(&result.payload)?;
    Ok(out)
}

pub(crate) fn branched(result: &BranchResult) -> Value {
    json!({
        "ref": result.ref_name,
        "tipCommit": result.tip_commit,
        "copied": result.copied,
    })
}

pub(crate) fn star(toggle: &StarToggle) -> Value {
    json!({
        "nodeId": toggle.node_id,
        "starred": toggle.starred,
        "stars": toggle.stars,
    })
}

pub(crate) fn draft(row: &DraftRow) -> Value {
    json!({
        "ref": row.ref_name,
        "userId": row.user_id,
        "kind": row.kind,
        "contentHash": row.content_hash,
        "updatedAt": ts_ms_to_rfc3339(row.updated_at_ms),
    })
}

pub(crate) fn canvas(canvas: &Canvas) -> Value {
    match canvas {
        Canvas::Draft(row) => json!({
            "source": "draft",
            "kind": row.kind,
            "content": row.content,
            "contentHash": row.content_hash,
            "updatedAt": ts_ms_to_rfc3339(row.updated_at_ms),
        }),
        Canvas::Artifact(row) => json!({
            "source": "artifact",
            "commitId": row.commit_id,
            "kind": row.kind,
            "content": row.content,
            "contentHash": row.content_hash,
            "createdAt": ts_ms_to_rfc3339(row.created_at_ms),
        }),
        Canvas::None => json!({ "source": "none" }),
    }
}

pub(crate) fn history(page: &HistoryPage) -> Result<Value, serde_json::Error> {
    let mut entries = Vec::with_capacity(page.entries.len());
    for entry in &page.entries {
        let mut node = serde_json::to_value(&entry.node)?;
        node["ordinal"] = json!(entry.ordinal);
        node["createdAt"] = json!(ts_ms_to_rfc3339(entry.node.created_at_ms));
        entries.push(node);
    }
    Ok(json!({
        "entries": entries,
        "nextCursor": page.next_cursor,
        "hasMore": page.has_more,
    }))
}

pub(crate) fn node_record(record: &NodeRecord) -> Result<Value, serde_json::Error> {
    Ok(json!({
        "node": serde_json::to_value(&record.node)?,
        "commit": {
            "id": record.commit.id,
            "parent1": record.commit.parent1,
            "parent2": record.commit.parent2,
            "message": record.commit.message,
            "author": record.commit.author,
            "createdAt": ts_ms_to_rfc3339(record.commit.created_at_ms),
        },
        "starred": record.starred,
    }))
}
