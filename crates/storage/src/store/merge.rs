#![forbid(unsafe_code)]

use super::*;
use loom_core::model::{MergePayload, NodePayload};
use rusqlite::{Connection, OptionalExtension, params};

impl SqliteStore {
    /// Appends a merge node to `target_ref` whose second parent is the
    /// current tip of `source_ref`. Only the target is locked; the source
    /// tip is whatever the transaction sees when it starts.
    pub fn merge(&mut self, request: MergeRequest) -> Result<MergeResult, StoreError> {
        let (project, target_ref) =
            scoped_ref(&request.user_id, &request.project_id, &request.target_ref)?;
        let user = canonicalize_user(&request.user_id)?;
        let source_ref = canonicalize_ref(&request.source_ref)?;
        if source_ref == target_ref {
            return Err(StoreError::InvalidInput("source_ref and target_ref must differ"));
        }
        let merge_summary = request.merge_summary.trim();
        if merge_summary.is_empty() {
            return Err(StoreError::InvalidInput("merge_summary must not be empty"));
        }
        let requested_ids = match &request.source_node_ids {
            Some(ids) => Some(
                ids.iter()
                    .map(|id| canonicalize_node(id))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };
        let message = match request.message.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => format!("merge {source_ref} into {target_ref}"),
        };

        let _guard = self.lock(LockKey::for_ref(&project, &target_ref))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &user)?;
        ref_state_tx(&tx, &caller.project, &target_ref)?;
        let source_tip = ref_state_tx(&tx, &caller.project, &source_ref)?
            .tip_commit
            .ok_or_else(|| StoreError::SourceTipUnavailable(source_ref.clone()))?;
        let source_head = commit_node_tx(&tx, &caller.project, &source_tip)?
            .ok_or_else(|| StoreError::SourceTipUnavailable(source_ref.clone()))?;

        let mut source_node_ids = match requested_ids {
            Some(ids) => ids,
            None => nodes_missing_from_tx(&tx, &caller.project, &source_ref, &target_ref)?,
        };
        source_node_ids.retain(|id| id != &source_head);
        source_node_ids.push(source_head);

        let mut payload = MergePayload {
            id: String::new(),
            merge_from: source_ref.clone(),
            merge_summary: merge_summary.to_string(),
            source_commit: source_tip.clone(),
            source_node_ids,
            canvas_diff: request.canvas_diff,
            merged_assistant_content: request.merged_assistant_content,
        };
        let commit = write_node_tx(
            &tx,
            NodeWrite {
                project: &caller.project,
                ref_name: &target_ref,
                author: &caller.user,
                message: &message,
                parent2: Some(&source_tip),
                now_ms,
            },
            |id| {
                payload.id = id;
                NodePayload::Merge(payload.clone())
            },
        )?;
        tx.commit()?;

        tracing::debug!(
            project = %caller.project,
            target_ref = %target_ref,
            source_ref = %source_ref,
            ordinal = commit.ordinal,
            commit = %commit.commit_id,
            source_commit = %source_tip,
            "refs merged"
        );
        Ok(MergeResult {
            commit,
            source_commit: source_tip,
            payload,
        })
    }
}

fn commit_node_tx(
    conn: &Connection,
    project: &str,
    commit_id: &str,
) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id FROM nodes WHERE project=?1 AND commit_id=?2",
            params![project, commit_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

/// Node ids on `source_ref` whose commits `target_ref` does not carry, in
/// source order.
fn nodes_missing_from_tx(
    conn: &Connection,
    project: &str,
    source_ref: &str,
    target_ref: &str,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT n.id
        FROM commit_order o
        JOIN nodes n ON n.project=o.project AND n.commit_id=o.commit_id
        WHERE o.project=?1 AND o.ref=?2
          AND o.commit_id NOT IN (
            SELECT t.commit_id FROM commit_order t WHERE t.project=?1 AND t.ref=?3
          )
        ORDER BY o.ordinal ASC
        "#,
    )?;
    let mut rows = stmt.query(params![project, source_ref, target_ref])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get::<_, String>(0)?);
    }
    Ok(out)
}
