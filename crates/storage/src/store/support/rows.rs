#![forbid(unsafe_code)]

use super::super::{HistoryEntry, StoreError};
use loom_core::model::{HistoryNode, NodePayload};
use rusqlite::Row;

/// Node id, commit id, predecessor node id, authored-on ref, timestamp and
/// payload. Expects `n` (the node), `c` (its commit) and `pn` (the node on
/// the commit's first parent) in scope.
pub(in crate::store) const NODE_COLUMNS: &str =
    "n.id, n.commit_id, pn.id, n.created_on_ref, n.created_at_ms, n.content_json";

pub(in crate::store) const NODE_JOINS: &str = "JOIN commits c ON c.project=n.project AND c.id=n.commit_id \
     LEFT JOIN nodes pn ON pn.project=c.project AND pn.commit_id=c.parent1";

/// `FROM` clause for ordered history rows; select `o.ordinal` then
/// [`NODE_COLUMNS`].
pub(in crate::store) const HISTORY_FROM: &str = "FROM commit_order o \
     JOIN nodes n ON n.project=o.project AND n.commit_id=o.commit_id \
     JOIN commits c ON c.project=n.project AND c.id=n.commit_id \
     LEFT JOIN nodes pn ON pn.project=c.project AND pn.commit_id=c.parent1";

/// Decodes [`NODE_COLUMNS`] starting at column `first`.
pub(in crate::store) fn node_from_row(row: &Row<'_>, first: usize) -> Result<HistoryNode, StoreError> {
    let content_json: String = row.get(first + 5)?;
    let payload: NodePayload = serde_json::from_str(&content_json)?;
    Ok(HistoryNode {
        id: row.get(first)?,
        commit_id: row.get(first + 1)?,
        parent_id: row.get(first + 2)?,
        created_on_ref: row.get(first + 3)?,
        created_at_ms: row.get(first + 4)?,
        payload,
    })
}

pub(in crate::store) fn history_entry_from_row(row: &Row<'_>) -> Result<HistoryEntry, StoreError> {
    Ok(HistoryEntry {
        ordinal: row.get(0)?,
        node: node_from_row(row, 1)?,
    })
}
