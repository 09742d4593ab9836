#![forbid(unsafe_code)]

use super::*;
use loom_core::model::RefHistory;
use rusqlite::{Connection, OptionalExtension, params};

impl SqliteStore {
    /// Last `limit` nodes before the cursor (or the tip), oldest first.
    /// `limit` is clamped to the configured page cap.
    pub fn get_history(&mut self, request: HistoryRequest) -> Result<HistoryPage, StoreError> {
        if request.limit == 0 {
            return Err(StoreError::InvalidInput("limit must be positive"));
        }
        if request.before_ordinal.is_some_and(|cursor| cursor < 0) {
            return Err(StoreError::InvalidInput("before_ordinal must not be negative"));
        }
        let limit = request.limit.min(self.options.history_page_cap);

        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        let ref_name = canonicalize_ref(&request.ref_name)?;
        ref_state_tx(&tx, &caller.project, &ref_name)?;

        let mut entries = Vec::with_capacity(limit + 1);
        {
            let sql = format!(
                "SELECT o.ordinal, {NODE_COLUMNS} {HISTORY_FROM} \
                 WHERE o.project=?1 AND o.ref=?2 AND (?3 IS NULL OR o.ordinal < ?3) \
                 ORDER BY o.ordinal DESC LIMIT ?4"
            );
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params![
                caller.project,
                ref_name,
                request.before_ordinal,
                to_sqlite_i64(limit + 1)?
            ])?;
            while let Some(row) = rows.next()? {
                entries.push(history_entry_from_row(row)?);
            }
        }
        tx.commit()?;

        let has_more = entries.len() > limit;
        entries.truncate(limit);
        entries.reverse();
        let next_cursor = if has_more {
            entries.first().map(|entry| entry.ordinal)
        } else {
            None
        };
        Ok(HistoryPage {
            entries,
            next_cursor,
            has_more,
        })
    }

    pub fn show_node(&mut self, request: ShowNodeRequest) -> Result<NodeRecord, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        let node_id = canonicalize_node(&request.node_id)?;

        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes n {NODE_JOINS} WHERE n.project=?1 AND n.id=?2");
        let node = {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params![caller.project, node_id])?;
            match rows.next()? {
                Some(row) => node_from_row(row, 0)?,
                None => return Err(StoreError::UnknownNode(node_id)),
            }
        };
        let commit = commit_row_tx(&tx, &caller.project, &node.commit_id)?
            .ok_or_else(|| StoreError::UnknownNode(node_id.clone()))?;
        let starred = tx
            .query_row(
                "SELECT 1 FROM stars WHERE project=?1 AND node_id=?2",
                params![caller.project, node_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        tx.commit()?;

        Ok(NodeRecord {
            node,
            commit,
            starred,
        })
    }

    /// Full oldest-first histories of the named refs, or of every ref when
    /// none are named.
    pub fn ref_histories(
        &mut self,
        request: RefHistoriesRequest,
    ) -> Result<Vec<RefHistory>, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        let names = if request.refs.is_empty() {
            ref_names_tx(&tx, &caller.project)?
        } else {
            request
                .refs
                .iter()
                .map(|name| canonicalize_ref(name))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            ref_state_tx(&tx, &caller.project, &name)?;
            out.push(ref_history_tx(&tx, &caller.project, &name)?);
        }
        tx.commit()?;
        Ok(out)
    }
}

pub(in crate::store) fn ref_names_tx(conn: &Connection, project: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM refs WHERE project=?1 ORDER BY name ASC")?;
    let mut rows = stmt.query(params![project])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row.get::<_, String>(0)?);
    }
    Ok(out)
}

pub(in crate::store) fn ref_history_tx(
    conn: &Connection,
    project: &str,
    ref_name: &str,
) -> Result<RefHistory, StoreError> {
    let sql = format!(
        "SELECT o.ordinal, {NODE_COLUMNS} {HISTORY_FROM} \
         WHERE o.project=?1 AND o.ref=?2 ORDER BY o.ordinal ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![project, ref_name])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        nodes.push(history_entry_from_row(row)?.node);
    }
    Ok(RefHistory {
        ref_name: ref_name.to_string(),
        nodes,
    })
}
