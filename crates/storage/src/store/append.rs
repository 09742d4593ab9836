#![forbid(unsafe_code)]

use super::canvas::{draft_row_tx, latest_artifact_tx};
use super::*;
use loom_core::model::NodeContent;
use rusqlite::params;

impl SqliteStore {
    pub fn append_node(&mut self, request: AppendNodeRequest) -> Result<AppendResult, StoreError> {
        let (project, ref_name) =
            scoped_ref(&request.user_id, &request.project_id, &request.ref_name)?;
        let user = canonicalize_user(&request.user_id)?;
        let message = match request.message.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default_message(&request.content),
        };

        let _guard = self.lock(LockKey::for_ref(&project, &ref_name))?;
        let _draft_guard = if request.commit_draft {
            Some(self.lock(LockKey::for_draft(&project, &ref_name, &user))?)
        } else {
            None
        };

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &user)?;
        if request.ensure_ref && ensure_ref_tx(&tx, &caller.project, &ref_name, now_ms)? {
            tracing::debug!(project = %caller.project, ref_name = %ref_name, "ref created on append");
        }

        let content = request.content;
        let commit = write_node_tx(
            &tx,
            NodeWrite {
                project: &caller.project,
                ref_name: &ref_name,
                author: &caller.user,
                message: &message,
                parent2: None,
                now_ms,
            },
            |id| content.into_payload(id),
        )?;

        let artifact_hash = if request.commit_draft {
            commit_draft_tx(&tx, &caller, &ref_name, &commit.commit_id, now_ms)?
        } else {
            None
        };
        tx.commit()?;

        tracing::debug!(
            project = %caller.project,
            ref_name = %ref_name,
            ordinal = commit.ordinal,
            commit = %commit.commit_id,
            node = %commit.node_id,
            "node appended"
        );
        Ok(AppendResult {
            commit,
            artifact_hash,
        })
    }
}

fn default_message(content: &NodeContent) -> String {
    match content.role() {
        Some(role) => format!("{} {}", content.kind().as_str(), role.as_str()),
        None => content.kind().as_str().to_string(),
    }
}

/// Turns the caller's draft into an artifact on `commit_id` unless it
/// repeats the newest artifact already on the ref. The draft is cleared
/// either way so the ref's artifact shows through again.
fn commit_draft_tx(
    conn: &rusqlite::Connection,
    caller: &Caller,
    ref_name: &str,
    commit_id: &str,
    now_ms: i64,
) -> Result<Option<String>, StoreError> {
    let Some(draft) = draft_row_tx(conn, &caller.project, ref_name, &caller.user)? else {
        return Ok(None);
    };
    let latest = latest_artifact_tx(conn, &caller.project, ref_name)?;

    let snapshot = match latest {
        Some(artifact) if artifact.content_hash == draft.content_hash => None,
        _ => {
            conn.execute(
                "INSERT INTO artifacts(project, commit_id, kind, content, content_hash, created_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    caller.project,
                    commit_id,
                    draft.kind,
                    draft.content,
                    draft.content_hash,
                    now_ms
                ],
            )?;
            Some(draft.content_hash)
        }
    };

    conn.execute(
        "DELETE FROM artifact_drafts WHERE project=?1 AND ref=?2 AND user_id=?3",
        params![caller.project, ref_name, caller.user],
    )?;
    Ok(snapshot)
}
