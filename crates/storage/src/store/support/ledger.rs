#![forbid(unsafe_code)]

use super::super::{CommitRow, NodeCommit, StoreError, map_insert_conflict};
use loom_core::model::NodePayload;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Clone, Debug)]
pub(in crate::store) struct RefState {
    pub tip_commit: Option<String>,
    pub updated_at_ms: i64,
}

pub(in crate::store) fn next_counter_tx(
    conn: &Connection,
    project: &str,
    name: &str,
) -> Result<i64, StoreError> {
    let current: i64 = conn
        .query_row(
            "SELECT value FROM counters WHERE project=?1 AND name=?2",
            params![project, name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    conn.execute(
        r#"
        INSERT INTO counters(project, name, value) VALUES (?1, ?2, ?3)
        ON CONFLICT(project, name) DO UPDATE SET value=excluded.value
        "#,
        params![project, name, next],
    )?;
    Ok(next)
}

pub(in crate::store) fn ref_exists_tx(
    conn: &Connection,
    project: &str,
    name: &str,
) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM refs WHERE project=?1 AND name=?2",
            params![project, name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub(in crate::store) fn ref_state_tx(
    conn: &Connection,
    project: &str,
    name: &str,
) -> Result<RefState, StoreError> {
    let value = conn
        .query_row(
            "SELECT tip_commit, updated_at_ms FROM refs WHERE project=?1 AND name=?2",
            params![project, name],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    match value {
        Some((tip_commit, updated_at_ms)) => Ok(RefState {
            tip_commit,
            updated_at_ms,
        }),
        None => Err(StoreError::RefNotFound(name.to_string())),
    }
}

pub(in crate::store) fn insert_ref_tx(
    conn: &Connection,
    project: &str,
    name: &str,
    tip_commit: Option<&str>,
    now_ms: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO refs(project, name, tip_commit, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![project, name, tip_commit, now_ms],
    )
    .map_err(|err| map_insert_conflict(err, name))?;
    Ok(())
}

/// Returns whether the ref had to be created.
pub(in crate::store) fn ensure_ref_tx(
    conn: &Connection,
    project: &str,
    name: &str,
    now_ms: i64,
) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO refs(project, name, tip_commit, created_at_ms, updated_at_ms) \
         VALUES (?1, ?2, NULL, ?3, ?3)",
        params![project, name, now_ms],
    )?;
    Ok(inserted > 0)
}

pub(in crate::store) fn next_ordinal_tx(
    conn: &Connection,
    project: &str,
    ref_name: &str,
) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(ordinal) + 1, 0) FROM commit_order WHERE project=?1 AND ref=?2",
        params![project, ref_name],
        |row| row.get::<_, i64>(0),
    )?)
}

pub(in crate::store) fn order_commit_at_tx(
    conn: &Connection,
    project: &str,
    ref_name: &str,
    ordinal: i64,
) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT commit_id FROM commit_order WHERE project=?1 AND ref=?2 AND ordinal=?3",
            params![project, ref_name, ordinal],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

/// Copies `from`'s commit-order rows (all, or those below `below`) under
/// `to`, keeping ordinals and commits. Returns the number of rows copied.
pub(in crate::store) fn copy_order_prefix_tx(
    conn: &Connection,
    project: &str,
    from: &str,
    to: &str,
    below: Option<i64>,
) -> Result<i64, StoreError> {
    let copied = conn.execute(
        "INSERT INTO commit_order(project, ref, ordinal, commit_id) \
         SELECT project, ?3, ordinal, commit_id FROM commit_order \
         WHERE project=?1 AND ref=?2 AND (?4 IS NULL OR ordinal < ?4)",
        params![project, from, to, below],
    )?;
    Ok(i64::try_from(copied).unwrap_or(i64::MAX))
}

pub(in crate::store) fn commit_row_tx(
    conn: &Connection,
    project: &str,
    commit_id: &str,
) -> Result<Option<CommitRow>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, parent1, parent2, message, author, created_at_ms \
             FROM commits WHERE project=?1 AND id=?2",
            params![project, commit_id],
            |row| {
                Ok(CommitRow {
                    id: row.get(0)?,
                    parent1: row.get(1)?,
                    parent2: row.get(2)?,
                    message: row.get(3)?,
                    author: row.get(4)?,
                    created_at_ms: row.get(5)?,
                })
            },
        )
        .optional()?)
}

pub(in crate::store) fn node_commit_tx(
    conn: &Connection,
    project: &str,
    node_id: &str,
) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT commit_id FROM nodes WHERE project=?1 AND id=?2",
            params![project, node_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

/// One node-carrying commit appended to a ref.
pub(in crate::store) struct NodeWrite<'a> {
    pub project: &'a str,
    pub ref_name: &'a str,
    pub author: &'a str,
    pub message: &'a str,
    /// Second parent, set only for merges.
    pub parent2: Option<&'a str>,
    pub now_ms: i64,
}

/// Mints ids, then writes commit, node, commit-order row and the new tip.
/// The caller holds the ref lock and the write transaction.
pub(in crate::store) fn write_node_tx(
    conn: &Connection,
    write: NodeWrite<'_>,
    make_payload: impl FnOnce(String) -> NodePayload,
) -> Result<NodeCommit, StoreError> {
    let NodeWrite {
        project,
        ref_name,
        author,
        message,
        parent2,
        now_ms,
    } = write;

    let state = ref_state_tx(conn, project, ref_name)?;
    let ordinal = next_ordinal_tx(conn, project, ref_name)?;
    let last_in_order = match ordinal {
        0 => None,
        n => order_commit_at_tx(conn, project, ref_name, n - 1)?,
    };
    if last_in_order != state.tip_commit {
        return Err(StoreError::InvalidInput(
            "ref tip does not match its last commit-order row",
        ));
    }

    let commit_id = format!("c-{:08}", next_counter_tx(conn, project, "commit_seq")?);
    let node_id = format!("n-{:08}", next_counter_tx(conn, project, "node_seq")?);

    conn.execute(
        "INSERT INTO commits(project, id, parent1, parent2, message, author, created_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            project,
            commit_id,
            state.tip_commit,
            parent2,
            message,
            author,
            now_ms
        ],
    )?;

    let payload = make_payload(node_id.clone());
    let content_json = serde_json::to_string(&payload)?;
    conn.execute(
        "INSERT INTO nodes(project, id, commit_id, kind, role, created_on_ref, content_json, created_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            project,
            node_id,
            commit_id,
            payload.kind().as_str(),
            payload.role().map(|role| role.as_str()),
            ref_name,
            content_json,
            now_ms
        ],
    )?;

    conn.execute(
        "INSERT INTO commit_order(project, ref, ordinal, commit_id) VALUES (?1, ?2, ?3, ?4)",
        params![project, ref_name, ordinal, commit_id],
    )?;
    set_tip_tx(conn, project, ref_name, Some(&commit_id), state.updated_at_ms, now_ms)?;

    Ok(NodeCommit {
        ref_name: ref_name.to_string(),
        commit_id,
        node_id,
        ordinal,
    })
}

pub(in crate::store) fn set_tip_tx(
    conn: &Connection,
    project: &str,
    ref_name: &str,
    tip_commit: Option<&str>,
    previous_updated_at_ms: i64,
    now_ms: i64,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE refs SET tip_commit=?3, updated_at_ms=?4 WHERE project=?1 AND name=?2",
        params![
            project,
            ref_name,
            tip_commit,
            previous_updated_at_ms.max(now_ms)
        ],
    )?;
    Ok(())
}
