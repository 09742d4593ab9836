#![forbid(unsafe_code)]

use super::*;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    /// Creates the project, makes the caller its owner and opens an empty
    /// default ref.
    pub fn create_project(
        &mut self,
        request: CreateProjectRequest,
    ) -> Result<ProjectRow, StoreError> {
        let user = canonicalize_user(&request.user_id)?;
        let project = canonicalize_project(&request.project_id)?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("name must not be empty"));
        }
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        if project_exists_tx(&tx, &project)? {
            return Err(StoreError::ProjectAlreadyExists(project));
        }
        tx.execute(
            r#"
            INSERT INTO projects(id, owner, name, description, default_ref, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![project, user, name, description, DEFAULT_REF, now_ms],
        )?;
        insert_member_tx(&tx, &project, &user, MemberRole::Owner, now_ms)?;
        ensure_ref_tx(&tx, &project, DEFAULT_REF, now_ms)?;
        tx.commit()?;

        tracing::debug!(project = %project, owner = %user, "project created");
        Ok(ProjectRow {
            id: project,
            owner: user,
            name: name.to_string(),
            description,
            default_ref: DEFAULT_REF.to_string(),
            created_at_ms: now_ms,
        })
    }

    /// Owner-only. Adding an existing member is a no-op that keeps their role.
    pub fn add_member(&mut self, request: AddMemberRequest) -> Result<MemberRow, StoreError> {
        let member = canonicalize_user(&request.member_id)
            .map_err(|_| StoreError::InvalidInput("member_id must not be empty"))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        if caller.role != MemberRole::Owner {
            return Err(StoreError::OwnerRequired("add members"));
        }
        insert_member_tx(&tx, &caller.project, &member, MemberRole::Member, now_ms)?;
        let row = member_row_tx(&tx, &caller.project, &member)?
            .ok_or(StoreError::InvalidInput("member row vanished"))?;
        tx.commit()?;

        tracing::debug!(project = %caller.project, member = %member, "member added");
        Ok(row)
    }

    pub fn list_members(
        &mut self,
        user_id: &str,
        project_id: &str,
    ) -> Result<Vec<MemberRow>, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, project_id, user_id)?;
        let mut out = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT user_id, role, created_at_ms FROM project_members \
                 WHERE project=?1 ORDER BY created_at_ms ASC, user_id ASC",
            )?;
            let mut rows = stmt.query(params![caller.project])?;
            while let Some(row) = rows.next()? {
                let role: String = row.get(1)?;
                out.push(MemberRow {
                    project_id: caller.project.clone(),
                    user_id: row.get(0)?,
                    role: MemberRole::parse(&role)
                        .ok_or(StoreError::InvalidInput("unknown member role"))?,
                    created_at_ms: row.get(2)?,
                });
            }
        }
        tx.commit()?;
        Ok(out)
    }

    pub fn get_project(
        &mut self,
        user_id: &str,
        project_id: &str,
    ) -> Result<ProjectRow, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, project_id, user_id)?;
        let row = project_row_tx(&tx, &caller.project)?
            .ok_or_else(|| StoreError::UnknownProject(caller.project.clone()))?;
        tx.commit()?;
        Ok(row)
    }
}

pub(in crate::store) fn project_row_tx(
    conn: &rusqlite::Connection,
    project: &str,
) -> Result<Option<ProjectRow>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id, owner, name, description, default_ref, created_at_ms \
             FROM projects WHERE id=?1",
            params![project],
            |row| {
                Ok(ProjectRow {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    default_ref: row.get(4)?,
                    created_at_ms: row.get(5)?,
                })
            },
        )
        .optional()?)
}

fn member_row_tx(
    conn: &rusqlite::Connection,
    project: &str,
    user: &str,
) -> Result<Option<MemberRow>, StoreError> {
    let row = conn
        .query_row(
            "SELECT role, created_at_ms FROM project_members WHERE project=?1 AND user_id=?2",
            params![project, user],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;
    match row {
        Some((role, created_at_ms)) => Ok(Some(MemberRow {
            project_id: project.to_string(),
            user_id: user.to_string(),
            role: MemberRole::parse(&role)
                .ok_or(StoreError::InvalidInput("unknown member role"))?,
            created_at_ms,
        })),
        None => Ok(None),
    }
}
