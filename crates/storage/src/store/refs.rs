#![forbid(unsafe_code)]

use super::*;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    /// Opens an empty ref (no tip). With `if_absent` an existing ref is
    /// returned unchanged instead of failing.
    pub fn create_ref(&mut self, request: CreateRefRequest) -> Result<RefRow, StoreError> {
        let (project, ref_name) =
            scoped_ref(&request.user_id, &request.project_id, &request.ref_name)?;
        let _guard = self.lock(LockKey::for_ref(&project, &ref_name))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &request.user_id)?;
        if request.if_absent {
            ensure_ref_tx(&tx, &caller.project, &ref_name, now_ms)?;
        } else {
            insert_ref_tx(&tx, &caller.project, &ref_name, None, now_ms)?;
        }
        let row = ref_row_tx(&tx, &caller.project, &ref_name)?;
        tx.commit()?;

        tracing::debug!(project = %caller.project, ref_name = %ref_name, "ref created");
        Ok(row)
    }

    pub fn list_refs(&mut self, request: ListRefsRequest) -> Result<Vec<RefRow>, StoreError> {
        let tx = self.conn.transaction()?;
        let caller = caller_tx(&tx, &request.project_id, &request.user_id)?;
        let mut out = Vec::new();
        {
            let mut stmt = tx.prepare(
                r#"
                SELECT r.name, r.tip_commit, r.created_at_ms, r.updated_at_ms,
                       (SELECT COUNT(*) FROM commit_order o WHERE o.project=r.project AND o.ref=r.name)
                FROM refs r
                WHERE r.project=?1
                ORDER BY r.name ASC
                "#,
            )?;
            let mut rows = stmt.query(params![caller.project])?;
            while let Some(row) = rows.next()? {
                out.push(RefRow {
                    name: row.get(0)?,
                    tip_commit: row.get(1)?,
                    created_at_ms: row.get(2)?,
                    updated_at_ms: row.get(3)?,
                    length: row.get(4)?,
                });
            }
        }
        tx.commit()?;
        Ok(out)
    }

    /// New ref sharing `from_ref`'s entire history and tip.
    pub fn branch_from_ref(
        &mut self,
        request: BranchFromRefRequest,
    ) -> Result<BranchResult, StoreError> {
        let (project, new_ref) =
            scoped_ref(&request.user_id, &request.project_id, &request.new_ref)?;
        let from_ref = canonicalize_ref(&request.from_ref)?;
        if from_ref == new_ref {
            return Err(StoreError::InvalidInput("from_ref and new_ref must differ"));
        }
        let _guard = self.lock(LockKey::for_ref(&project, &new_ref))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &request.user_id)?;
        let from = ref_state_tx(&tx, &caller.project, &from_ref)?;
        if ref_exists_tx(&tx, &caller.project, &new_ref)? {
            return Err(StoreError::RefAlreadyExists(new_ref));
        }
        insert_ref_tx(
            &tx,
            &caller.project,
            &new_ref,
            from.tip_commit.as_deref(),
            now_ms,
        )?;
        let copied = copy_order_prefix_tx(&tx, &caller.project, &from_ref, &new_ref, None)?;
        tx.commit()?;

        tracing::debug!(
            project = %caller.project,
            from_ref = %from_ref,
            new_ref = %new_ref,
            copied,
            "ref branched"
        );
        Ok(BranchResult {
            ref_name: new_ref,
            tip_commit: from.tip_commit,
            copied,
        })
    }

    /// Points `new_ref` just before `node_id` on `source_ref`, so the next
    /// append there becomes an alternative to that node. An existing
    /// `new_ref` is rewritten, which makes retries idempotent.
    pub fn branch_from_node(
        &mut self,
        request: BranchFromNodeRequest,
    ) -> Result<BranchResult, StoreError> {
        let (project, new_ref) =
            scoped_ref(&request.user_id, &request.project_id, &request.new_ref)?;
        let source_ref = canonicalize_ref(&request.source_ref)?;
        let node_id = canonicalize_node(&request.node_id)?;
        if source_ref == new_ref {
            return Err(StoreError::InvalidInput("source_ref and new_ref must differ"));
        }
        let _guard = self.lock(LockKey::for_ref(&project, &new_ref))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &request.user_id)?;
        ref_state_tx(&tx, &caller.project, &source_ref)?;

        let not_on_ref = || StoreError::NodeNotOnRef {
            node: node_id.clone(),
            ref_name: source_ref.clone(),
        };
        let commit_id = node_commit_tx(&tx, &caller.project, &node_id)?.ok_or_else(not_on_ref)?;
        let ordinal = commit_ordinal_tx(&tx, &caller.project, &source_ref, &commit_id)?
            .ok_or_else(not_on_ref)?;
        let commit = commit_row_tx(&tx, &caller.project, &commit_id)?.ok_or_else(not_on_ref)?;

        tx.execute(
            "DELETE FROM commit_order WHERE project=?1 AND ref=?2",
            params![caller.project, new_ref],
        )?;
        match ref_state_tx(&tx, &caller.project, &new_ref) {
            Ok(state) => set_tip_tx(
                &tx,
                &caller.project,
                &new_ref,
                commit.parent1.as_deref(),
                state.updated_at_ms,
                now_ms,
            )?,
            Err(StoreError::RefNotFound(_)) => insert_ref_tx(
                &tx,
                &caller.project,
                &new_ref,
                commit.parent1.as_deref(),
                now_ms,
            )?,
            Err(err) => return Err(err),
        }
        let copied =
            copy_order_prefix_tx(&tx, &caller.project, &source_ref, &new_ref, Some(ordinal))?;
        tx.commit()?;

        tracing::debug!(
            project = %caller.project,
            source_ref = %source_ref,
            new_ref = %new_ref,
            node = %node_id,
            copied,
            "ref branched at node"
        );
        Ok(BranchResult {
            ref_name: new_ref,
            tip_commit: commit.parent1,
            copied,
        })
    }

    pub fn rename_ref(&mut self, request: RenameRefRequest) -> Result<RefRow, StoreError> {
        let (project, from) = scoped_ref(&request.user_id, &request.project_id, &request.from)?;
        let to = canonicalize_ref(&request.to)?;
        if from == to {
            return Err(StoreError::InvalidInput("from and to must differ"));
        }

        // Both names, in a fixed order, so two opposite renames cannot deadlock.
        let (first, second) = if from < to { (&from, &to) } else { (&to, &from) };
        let _first = self.lock(LockKey::for_ref(&project, first))?;
        let _second = self.lock(LockKey::for_ref(&project, second))?;

        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let caller = caller_tx(&tx, &project, &request.user_id)?;
        let state = ref_state_tx(&tx, &caller.project, &from)?;
        if ref_exists_tx(&tx, &caller.project, &to)? {
            return Err(StoreError::RefAlreadyExists(to));
        }

        tx.execute(
            "UPDATE refs SET name=?3, updated_at_ms=?4 WHERE project=?1 AND name=?2",
            params![
                caller.project,
                from,
                to,
                state.updated_at_ms.max(now_ms)
            ],
        )?;
        tx.execute(
            "UPDATE commit_order SET ref=?3 WHERE project=?1 AND ref=?2",
            params![caller.project, from, to],
        )?;
        tx.execute(
            "UPDATE artifact_drafts SET ref=?3 WHERE project=?1 AND ref=?2",
            params![caller.project, from, to],
        )?;
        tx.execute(
            "UPDATE projects SET default_ref=?3 WHERE id=?1 AND default_ref=?2",
            params![caller.project, from, to],
        )?;
        let row = ref_row_tx(&tx, &caller.project, &to)?;
        tx.commit()?;

        tracing::debug!(project = %caller.project, from = %from, to = %to, "ref renamed");
        Ok(row)
    }
}

pub(in crate::store) fn commit_ordinal_tx(
    conn: &rusqlite::Connection,
    project: &str,
    ref_name: &str,
    commit_id: &str,
) -> Result<Option<i64>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT ordinal FROM commit_order WHERE project=?1 AND ref=?2 AND commit_id=?3",
            params![project, ref_name, commit_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?)
}

fn ref_row_tx(
    conn: &rusqlite::Connection,
    project: &str,
    ref_name: &str,
) -> Result<RefRow, StoreError> {
    let row = conn
        .query_row(
            r#"
            SELECT r.tip_commit, r.created_at_ms, r.updated_at_ms,
                   (SELECT COUNT(*) FROM commit_order o WHERE o.project=r.project AND o.ref=r.name)
            FROM refs r
            WHERE r.project=?1 AND r.name=?2
            "#,
            params![project, ref_name],
            |row| {
                Ok(RefRow {
                    name: ref_name.to_string(),
                    tip_commit: row.get(0)?,
                    created_at_ms: row.get(1)?,
                    updated_at_ms: row.get(2)?,
                    length: row.get(3)?,
                })
            },
        )
        .optional()?;
    row.ok_or_else(|| StoreError::RefNotFound(ref_name.to_string()))
}
