#![forbid(unsafe_code)]

use loom_core::model::{NodeContent, Role};
use loom_storage::{
    AddMemberRequest, AppendNodeRequest, CreateProjectRequest, ListRefsRequest, MemberRole,
    SqliteStore, StoreError,
};
use rusqlite::Connection;
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("loom_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn create_project(user: &str, project: &str) -> CreateProjectRequest {
    CreateProjectRequest {
        user_id: user.to_string(),
        project_id: project.to_string(),
        name: "Project".to_string(),
        description: None,
    }
}

fn append_as(user: &str, project: &str) -> AppendNodeRequest {
    AppendNodeRequest {
        user_id: user.to_string(),
        project_id: project.to_string(),
        ref_name: "main".to_string(),
        content: NodeContent::Message {
            role: Role::User,
            content: "hi".to_string(),
            raw_response: None,
        },
        message: None,
        ensure_ref: false,
        commit_draft: false,
    }
}

#[test]
fn new_project_has_owner_and_empty_main() {
    let mut store = SqliteStore::open(temp_dir("new_project")).expect("open store");
    let project = store
        .create_project(create_project(" alice ", "p1"))
        .expect("create project");
    assert_eq!(project.owner, "alice");
    assert_eq!(project.default_ref, "main");

    let refs = store
        .list_refs(ListRefsRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
        })
        .expect("list refs");
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].name, "main");
    assert_eq!(refs[0].tip_commit, None);

    let members = store.list_members("alice", "p1").expect("members");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].role, MemberRole::Owner);

    let err = store
        .create_project(create_project("bob", "p1"))
        .expect_err("duplicate project");
    assert!(matches!(err, StoreError::ProjectAlreadyExists(_)));
    assert_eq!(err.code(), "CONFLICT");
}

#[test]
fn blank_user_is_not_authenticated() {
    let mut store = SqliteStore::open(temp_dir("blank_user")).expect("open store");
    store
        .create_project(create_project("alice", "p1"))
        .expect("create project");

    let err = store
        .append_node(append_as("  ", "p1"))
        .expect_err("blank user");
    assert!(matches!(err, StoreError::NotAuthenticated));
    assert_eq!(err.code(), "NOT_AUTHENTICATED");

    let err = store
        .create_project(create_project("", "p2"))
        .expect_err("blank owner");
    assert_eq!(err.code(), "NOT_AUTHENTICATED");
}

#[test]
fn only_members_act_and_only_owners_add_members() {
    let mut store = SqliteStore::open(temp_dir("membership")).expect("open store");
    store
        .create_project(create_project("alice", "p1"))
        .expect("create project");

    let err = store
        .append_node(append_as("mallory", "p1"))
        .expect_err("not a member");
    assert!(
        matches!(&err, StoreError::NotAuthorized { project, user } if project == "p1" && user == "mallory")
    );
    assert_eq!(err.code(), "NOT_AUTHORIZED");
    assert!(!err.is_retryable());

    let added = store
        .add_member(AddMemberRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            member_id: "bob".to_string(),
        })
        .expect("owner adds bob");
    assert_eq!(added.role, MemberRole::Member);
    store.append_node(append_as("bob", "p1")).expect("bob appends");

    let err = store
        .add_member(AddMemberRequest {
            user_id: "bob".to_string(),
            project_id: "p1".to_string(),
            member_id: "mallory".to_string(),
        })
        .expect_err("members cannot add members");
    assert_eq!(err.code(), "NOT_AUTHORIZED");

    let err = store
        .append_node(append_as("alice", "nope"))
        .expect_err("unknown project");
    assert!(matches!(err, StoreError::UnknownProject(_)));
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn foreign_tables_require_reset() {
    let storage_dir = temp_dir("reset_foreign_table");
    drop(SqliteStore::open(&storage_dir).expect("open store"));

    let conn = Connection::open(storage_dir.join("loom.db")).expect("open raw db");
    conn.execute_batch("CREATE TABLE legacy_notes (id INTEGER PRIMARY KEY);")
        .expect("create foreign table");
    drop(conn);

    let err = SqliteStore::open(&storage_dir).expect_err("foreign table must fail closed");
    assert_eq!(err.code(), "RESET_REQUIRED");
    assert!(err.to_string().contains("RESET_REQUIRED"));
}

#[test]
fn schema_version_mismatch_requires_reset() {
    let storage_dir = temp_dir("reset_version");
    drop(SqliteStore::open(&storage_dir).expect("open store"));

    let conn = Connection::open(storage_dir.join("loom.db")).expect("open raw db");
    conn.execute("UPDATE store_meta SET schema_version=99 WHERE singleton=1", [])
        .expect("bump version");
    drop(conn);

    let err = SqliteStore::open(&storage_dir).expect_err("version mismatch");
    assert!(matches!(err, StoreError::ResetRequired(_)));

    // A fresh directory is always fine.
    SqliteStore::open(temp_dir("reset_version_fresh")).expect("fresh store");
}
