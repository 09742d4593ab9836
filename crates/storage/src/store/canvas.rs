#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Connection, OptionalExtension, params};

impl SqliteStore {
    /// Upserts the caller's draft for a ref. With `base_hash`, the save only
    /// goes through while the canvas the caller started from is still the
    /// current one.
    pub fn save_draft(&mut self, request: SaveDraftRequest) -> Result<DraftRow, StoreError> {
        let (project, ref_name) =
            scoped_ref(&request.user_id, &request.project_id, &request.ref_name)?;
        let user = canonicalize_user(&request.user_id)?;
        let kind = request.kind.trim();
        if kind.is_empty() {
            return Err(StoreError::InvalidInput("kind must not be empty"));
        }
        let _guard = self.lock(LockKey::for_draft(&project, &ref_name, &user))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &user)?;
        ref_state_tx(&tx, &caller.project, &ref_name)?;

        if let Some(expected) = request.base_hash.as_deref().map(str::trim) {
            let stored = current_canvas_tx(&tx, &caller.project, &ref_name, &caller.user)?
                .content_hash()
                .map(str::to_string);
            if stored.as_deref() != Some(expected) {
                return Err(StoreError::StaleDraft {
                    expected: expected.to_string(),
                    stored,
                });
            }
        }

        let content_hash = sha256_hex(&request.content);
        tx.execute(
            r#"
            INSERT INTO artifact_drafts(project, ref, user_id, kind, content, content_hash, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(project, ref, user_id) DO UPDATE SET
              kind=excluded.kind,
              content=excluded.content,
              content_hash=excluded.content_hash,
              updated_at_ms=excluded.updated_at_ms
            "#,
            params![
                caller.project,
                ref_name,
                caller.user,
                kind,
                request.content,
                content_hash,
                now_ms
            ],
        )?;
        tx.commit()?;

        tracing::debug!(
            project = %caller.project,
            ref_name = %ref_name,
            user = %caller.user,
            hash = %content_hash,
            "draft saved"
        );
        Ok(DraftRow {
            ref_name,
            user_id: caller.user,
            kind: kind.to_string(),
            content: request.content,
            content_hash,
            updated_at_ms: now_ms,
        })
    }

    /// The caller's own draft if there is one, else the newest artifact on
    /// the ref's history.
    pub fn get_canvas(&mut self, request: GetCanvasRequest) -> Result<Canvas, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        let ref_name = canonicalize_ref(&request.ref_name)?;
        ref_state_tx(&tx, &caller.project, &ref_name)?;
        let canvas = current_canvas_tx(&tx, &caller.project, &ref_name, &caller.user)?;
        tx.commit()?;
        Ok(canvas)
    }
}

pub(in crate::store) fn current_canvas_tx(
    conn: &Connection,
    project: &str,
    ref_name: &str,
    user: &str,
) -> Result<Canvas, StoreError> {
    if let Some(draft) = draft_row_tx(conn, project, ref_name, user)? {
        return Ok(Canvas::Draft(draft));
    }
    Ok(match latest_artifact_tx(conn, project, ref_name)? {
        Some(artifact) => Canvas::Artifact(artifact),
        None => Canvas::None,
    })
}

pub(in crate::store) fn draft_row_tx(
    conn: &Connection,
    project: &str,
    ref_name: &str,
    user: &str,
) -> Result<Option<DraftRow>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT kind, content, content_hash, updated_at_ms FROM artifact_drafts \
             WHERE project=?1 AND ref=?2 AND user_id=?3",
            params![project, ref_name, user],
            |row| {
                Ok(DraftRow {
                    ref_name: ref_name.to_string(),
                    user_id: user.to_string(),
                    kind: row.get(0)?,
                    content: row.get(1)?,
                    content_hash: row.get(2)?,
                    updated_at_ms: row.get(3)?,
                })
            },
        )
        .optional()?)
}

/// Newest artifact attached to a commit on the ref: highest ordinal first,
/// then highest sequence within that commit.
pub(in crate::store) fn latest_artifact_tx(
    conn: &Connection,
    project: &str,
    ref_name: &str,
) -> Result<Option<ArtifactRow>, StoreError> {
    Ok(conn
        .query_row(
            r#"
            SELECT a.seq, a.commit_id, a.kind, a.content, a.content_hash, a.created_at_ms
            FROM artifacts a
            JOIN commit_order o ON o.project=a.project AND o.commit_id=a.commit_id
            WHERE a.project=?1 AND o.ref=?2
            ORDER BY o.ordinal DESC, a.seq DESC
            LIMIT 1
            "#,
            params![project, ref_name],
            |row| {
                Ok(ArtifactRow {
                    seq: row.get(0)?,
                    commit_id: row.get(1)?,
                    kind: row.get(2)?,
                    content: row.get(3)?,
                    content_hash: row.get(4)?,
                    created_at_ms: row.get(5)?,
                })
            },
        )
        .optional()?)
}
