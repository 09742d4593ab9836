#![forbid(unsafe_code)]

use super::super::{MemberRole, StoreError};
use rusqlite::{Connection, OptionalExtension, params};

pub(in crate::store) fn project_exists_tx(
    conn: &Connection,
    project: &str,
) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM projects WHERE id=?1",
            params![project],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub(in crate::store) fn member_role_tx(
    conn: &Connection,
    project: &str,
    user: &str,
) -> Result<Option<MemberRole>, StoreError> {
    let role = conn
        .query_row(
            "SELECT role FROM project_members WHERE project=?1 AND user_id=?2",
            params![project, user],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match role {
        Some(role) => MemberRole::parse(&role)
            .map(Some)
            .ok_or(StoreError::InvalidInput("unknown member role")),
        None => Ok(None),
    }
}

/// Insert-if-absent; an existing membership keeps its role.
pub(in crate::store) fn insert_member_tx(
    conn: &Connection,
    project: &str,
    user: &str,
    role: MemberRole,
    now_ms: i64,
) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO project_members(project, user_id, role, created_at_ms) \
         VALUES (?1, ?2, ?3, ?4)",
        params![project, user, role.as_str(), now_ms],
    )?;
    Ok(inserted > 0)
}
