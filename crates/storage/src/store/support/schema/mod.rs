#![forbid(unsafe_code)]

use super::super::{StoreError, now_ms};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

pub(in crate::store) const SCHEMA_VERSION: i64 = 1;

const TABLES: [&str; 11] = [
    "store_meta",
    "projects",
    "project_members",
    "counters",
    "refs",
    "commits",
    "nodes",
    "commit_order",
    "artifacts",
    "artifact_drafts",
    "stars",
];

/// Refuses to touch a database this build did not create. An empty file is
/// fine; anything else must carry exactly the expected tables and version.
pub(in crate::store) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let required: BTreeSet<&str> = TABLES.into_iter().collect();

    if tables
        .iter()
        .any(|table| !required.contains(table.as_str()))
    {
        return Err(StoreError::ResetRequired(
            "RESET_REQUIRED: unsupported tables detected",
        ));
    }

    for table in required {
        if !tables.contains(table) {
            return Err(StoreError::ResetRequired(
                "RESET_REQUIRED: required table is missing",
            ));
        }
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_meta WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::ResetRequired(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::ResetRequired(
            "RESET_REQUIRED: schema state row is missing",
        )),
    }
}

pub(in crate::store) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    let now_ms = now_ms();

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_meta (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
          id TEXT PRIMARY KEY,
          owner TEXT NOT NULL,
          name TEXT NOT NULL,
          description TEXT,
          default_ref TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS project_members (
          project TEXT NOT NULL,
          user_id TEXT NOT NULL,
          role TEXT NOT NULL CHECK(role IN ('owner', 'member')),
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY(project, user_id),
          FOREIGN KEY(project) REFERENCES projects(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS counters (
          project TEXT NOT NULL,
          name TEXT NOT NULL,
          value INTEGER NOT NULL,
          PRIMARY KEY(project, name)
        );

        CREATE TABLE IF NOT EXISTS commits (
          project TEXT NOT NULL,
          id TEXT NOT NULL,
          parent1 TEXT,
          parent2 TEXT,
          message TEXT NOT NULL,
          author TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY(project, id),
          FOREIGN KEY(project) REFERENCES projects(id) ON DELETE CASCADE,
          FOREIGN KEY(project, parent1) REFERENCES commits(project, id) ON DELETE RESTRICT,
          FOREIGN KEY(project, parent2) REFERENCES commits(project, id) ON DELETE RESTRICT,
          CHECK(parent1 IS NULL OR parent1 <> id),
          CHECK(parent2 IS NULL OR parent2 <> id)
        );

        CREATE TABLE IF NOT EXISTS refs (
          project TEXT NOT NULL,
          name TEXT NOT NULL,
          tip_commit TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY(project, name),
          FOREIGN KEY(project) REFERENCES projects(id) ON DELETE CASCADE,
          FOREIGN KEY(project, tip_commit) REFERENCES commits(project, id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS nodes (
          project TEXT NOT NULL,
          id TEXT NOT NULL,
          commit_id TEXT NOT NULL,
          kind TEXT NOT NULL CHECK(kind IN ('message', 'state', 'merge')),
          role TEXT,
          created_on_ref TEXT NOT NULL,
          content_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY(project, id),
          UNIQUE(project, commit_id),
          FOREIGN KEY(project, commit_id) REFERENCES commits(project, id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS commit_order (
          project TEXT NOT NULL,
          ref TEXT NOT NULL,
          ordinal INTEGER NOT NULL CHECK(ordinal >= 0),
          commit_id TEXT NOT NULL,
          PRIMARY KEY(project, ref, ordinal),
          FOREIGN KEY(project, commit_id) REFERENCES commits(project, id) ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_commit_order_commit
          ON commit_order(project, commit_id, ref);

        CREATE TABLE IF NOT EXISTS artifacts (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          project TEXT NOT NULL,
          commit_id TEXT NOT NULL,
          kind TEXT NOT NULL,
          content TEXT NOT NULL,
          content_hash TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          FOREIGN KEY(project, commit_id) REFERENCES commits(project, id) ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_artifacts_commit
          ON artifacts(project, commit_id, seq);

        CREATE TABLE IF NOT EXISTS artifact_drafts (
          project TEXT NOT NULL,
          ref TEXT NOT NULL,
          user_id TEXT NOT NULL,
          kind TEXT NOT NULL,
          content TEXT NOT NULL,
          content_hash TEXT NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY(project, ref, user_id)
        );

        CREATE TABLE IF NOT EXISTS stars (
          project TEXT NOT NULL,
          node_id TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY(project, node_id),
          FOREIGN KEY(project, node_id) REFERENCES nodes(project, id) ON DELETE CASCADE
        );
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_meta(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;

    Ok(())
}
