#![forbid(unsafe_code)]

use super::*;
use rusqlite::{Connection, params};

impl SqliteStore {
    /// Flips the node's star and returns the project's full starred set.
    pub fn toggle_star(&mut self, request: ToggleStarRequest) -> Result<StarToggle, StoreError> {
        canonicalize_user(&request.user_id)?;
        let project = canonicalize_project(&request.project_id)?;
        let node_id = canonicalize_node(&request.node_id)?;
        let _guard = self.lock(LockKey::for_stars(&project))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &request.user_id)?;
        if node_commit_tx(&tx, &caller.project, &node_id)?.is_none() {
            return Err(StoreError::UnknownNode(node_id));
        }

        let removed = tx.execute(
            "DELETE FROM stars WHERE project=?1 AND node_id=?2",
            params![caller.project, node_id],
        )?;
        let starred = removed == 0;
        if starred {
            tx.execute(
                "INSERT INTO stars(project, node_id, created_at_ms) VALUES (?1, ?2, ?3)",
                params![caller.project, node_id, now_ms],
            )?;
        }
        let stars = starred_ids_tx(&tx, &caller.project)?;
        tx.commit()?;

        tracing::debug!(project = %caller.project, node = %node_id, starred, "star toggled");
        Ok(StarToggle {
            node_id,
            starred,
            stars,
        })
    }

    pub fn list_stars(&mut self, request: ListStarsRequest) -> Result<Vec<String>, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        let stars = starred_ids_tx(&tx, &caller.project)?;
        tx.commit()?;
        Ok(stars)
    }
}

pub(in crate::store) fn starred_ids_tx(
    conn: &Connection,
    project: &str,
) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT node_id FROM stars WHERE project=?1 ORDER BY node_id ASC")?;
    let mut rows = stmt.query(params![project])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get::<_, String>(0)?);
    }
    Ok(out)
}
