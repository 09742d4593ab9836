#![forbid(unsafe_code)]

use loom_core::model::{NodeContent, NodePayload, Role};
use loom_storage::{
    AppendNodeRequest, AppendResult, BranchFromNodeRequest, BranchFromRefRequest,
    CreateProjectRequest, CreateRefRequest, HistoryRequest, ListRefsRequest, MergeRequest,
    RefRow, RenameRefRequest, ShowNodeRequest, SqliteStore, StoreError, StoreOptions,
};
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

const USER: &str = "alice";
const PROJECT: &str = "p1";

fn seeded_store(test_name: &str, options: StoreOptions) -> SqliteStore {
    let mut store = SqliteStore::open_with(temp_dir(test_name), options).expect("open store");
    store
        .create_project(CreateProjectRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            name: "Project one".to_string(),
            description: None,
        })
        .expect("create project");
    store
}

fn say(store: &mut SqliteStore, ref_name: &str, text: &str) -> AppendResult {
    store
        .append_node(AppendNodeRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            ref_name: ref_name.to_string(),
            content: NodeContent::Message {
                role: Role::User,
                content: text.to_string(),
                raw_response: None,
            },
            message: None,
            ensure_ref: false,
            commit_draft: false,
        })
        .expect("append node")
}

fn ref_row(store: &mut SqliteStore, name: &str) -> RefRow {
    store
        .list_refs(ListRefsRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
        })
        .expect("list refs")
        .into_iter()
        .find(|row| row.name == name)
        .expect("ref listed")
}

fn history_ids(store: &mut SqliteStore, ref_name: &str) -> Vec<String> {
    store
        .get_history(HistoryRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            ref_name: ref_name.to_string(),
            limit: 500,
            before_ordinal: None,
        })
        .expect("history")
        .entries
        .into_iter()
        .map(|entry| entry.node.id)
        .collect()
}

fn branch(store: &mut SqliteStore, from_ref: &str, new_ref: &str) {
    store
        .branch_from_ref(BranchFromRefRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            from_ref: from_ref.to_string(),
            new_ref: new_ref.to_string(),
        })
        .expect("branch from ref");
}

fn merge_request(target_ref: &str, source_ref: &str) -> MergeRequest {
    MergeRequest {
        user_id: USER.to_string(),
        project_id: PROJECT.to_string(),
        target_ref: target_ref.to_string(),
        source_ref: source_ref.to_string(),
        merge_summary: "fold the side thread back in".to_string(),
        source_node_ids: None,
        canvas_diff: None,
        merged_assistant_content: None,
        message: None,
    }
}

#[test]
fn appends_assign_contiguous_ordinals_and_move_the_tip() {
    let mut store = seeded_store("appends_contiguous", StoreOptions::default());
    let a = say(&mut store, "main", "a");
    let b = say(&mut store, "main", "b");
    let c = say(&mut store, "main", "c");

    assert_eq!(
        [a.commit.ordinal, b.commit.ordinal, c.commit.ordinal],
        [0, 1, 2]
    );
    let main = ref_row(&mut store, "main");
    assert_eq!(main.tip_commit.as_deref(), Some(c.commit.commit_id.as_str()));
    assert_eq!(main.length, 3);

    let page = store
        .get_history(HistoryRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            ref_name: "main".to_string(),
            limit: 10,
            before_ordinal: None,
        })
        .expect("history");
    let parents: Vec<Option<&str>> = page
        .entries
        .iter()
        .map(|entry| entry.node.parent_id.as_deref())
        .collect();
    assert_eq!(
        parents,
        vec![
            None,
            Some(a.commit.node_id.as_str()),
            Some(b.commit.node_id.as_str())
        ]
    );
    assert!(
        page.entries
            .iter()
            .all(|entry| entry.node.created_on_ref.as_deref() == Some("main"))
    );

    let record = store
        .show_node(ShowNodeRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            node_id: c.commit.node_id.clone(),
        })
        .expect("show node");
    assert_eq!(record.commit.parent1.as_deref(), Some(b.commit.commit_id.as_str()));
    assert_eq!(record.commit.parent2, None);
    assert_eq!(record.commit.author, USER);
    assert_eq!(record.commit.message, "message user");
    assert_eq!(record.node.payload.id(), c.commit.node_id);
}

#[test]
fn append_to_missing_ref_needs_ensure_ref() {
    let mut store = seeded_store("append_missing_ref", StoreOptions::default());
    let request = AppendNodeRequest {
        user_id: USER.to_string(),
        project_id: PROJECT.to_string(),
        ref_name: "scratch".to_string(),
        content: NodeContent::State {
            artifact_snapshot: "h0".to_string(),
        },
        message: Some("checkpoint".to_string()),
        ensure_ref: false,
        commit_draft: false,
    };

    let err = store
        .append_node(request.clone())
        .expect_err("unknown ref must fail");
    assert!(matches!(err, StoreError::RefNotFound(ref name) if name == "scratch"));
    assert_eq!(err.code(), "NOT_FOUND");

    let appended = store
        .append_node(AppendNodeRequest {
            ensure_ref: true,
            ..request
        })
        .expect("append with ensure_ref");
    assert_eq!(appended.commit.ordinal, 0);
    assert_eq!(ref_row(&mut store, "scratch").length, 1);
}

#[test]
fn create_ref_is_idempotent_only_when_asked() {
    let mut store = seeded_store("create_ref", StoreOptions::default());
    let request = CreateRefRequest {
        user_id: USER.to_string(),
        project_id: PROJECT.to_string(),
        ref_name: "idea".to_string(),
        if_absent: false,
    };
    let created = store.create_ref(request.clone()).expect("create ref");
    assert_eq!(created.tip_commit, None);
    assert_eq!(created.length, 0);

    let err = store
        .create_ref(request.clone())
        .expect_err("second create must conflict");
    assert_eq!(err.code(), "CONFLICT");

    store
        .create_ref(CreateRefRequest {
            if_absent: true,
            ..request
        })
        .expect("if_absent tolerates existing ref");
}

#[test]
fn branch_from_ref_shares_the_whole_history() {
    let mut store = seeded_store("branch_from_ref", StoreOptions::default());
    say(&mut store, "main", "a");
    let b = say(&mut store, "main", "b");

    let result = store
        .branch_from_ref(BranchFromRefRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            from_ref: "main".to_string(),
            new_ref: "feat".to_string(),
        })
        .expect("branch");
    assert_eq!(result.copied, 2);
    assert_eq!(result.tip_commit.as_deref(), Some(b.commit.commit_id.as_str()));
    assert_eq!(history_ids(&mut store, "feat"), history_ids(&mut store, "main"));

    let d = say(&mut store, "feat", "d");
    assert_eq!(d.commit.ordinal, 2);
    assert_eq!(ref_row(&mut store, "main").length, 2);

    let err = store
        .branch_from_ref(BranchFromRefRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            from_ref: "main".to_string(),
            new_ref: "feat".to_string(),
        })
        .expect_err("taken name");
    assert!(matches!(err, StoreError::RefAlreadyExists(ref name) if name == "feat"));
}

#[test]
fn branch_from_node_starts_just_before_the_node() {
    let mut store = seeded_store("branch_from_node", StoreOptions::default());
    let a = say(&mut store, "main", "a");
    let b = say(&mut store, "main", "b");
    let c = say(&mut store, "main", "c");

    let request = BranchFromNodeRequest {
        user_id: USER.to_string(),
        project_id: PROJECT.to_string(),
        source_ref: "main".to_string(),
        new_ref: "alt".to_string(),
        node_id: c.commit.node_id.clone(),
    };
    let result = store.branch_from_node(request.clone()).expect("branch at node");
    assert_eq!(result.copied, 2);
    assert_eq!(result.tip_commit.as_deref(), Some(b.commit.commit_id.as_str()));

    let x = say(&mut store, "alt", "x");
    assert_eq!(x.commit.ordinal, 2);
    assert_eq!(
        history_ids(&mut store, "alt"),
        vec![
            a.commit.node_id.clone(),
            b.commit.node_id.clone(),
            x.commit.node_id.clone()
        ]
    );

    // Retrying rewrites the ref back to the same starting point.
    let again = store.branch_from_node(request).expect("retry");
    assert_eq!(again.copied, 2);
    assert_eq!(
        history_ids(&mut store, "alt"),
        vec![a.commit.node_id.clone(), b.commit.node_id.clone()]
    );

    let root = store
        .branch_from_node(BranchFromNodeRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            source_ref: "main".to_string(),
            new_ref: "fresh".to_string(),
            node_id: a.commit.node_id.clone(),
        })
        .expect("branch at root");
    assert_eq!(root.tip_commit, None);
    assert_eq!(root.copied, 0);

    for node_id in [x.commit.node_id.clone(), "n-99999999".to_string()] {
        let err = store
            .branch_from_node(BranchFromNodeRequest {
                user_id: USER.to_string(),
                project_id: PROJECT.to_string(),
                source_ref: "main".to_string(),
                new_ref: "other".to_string(),
                node_id,
            })
            .expect_err("node not on main");
        assert!(matches!(err, StoreError::NodeNotOnRef { .. }));
    }
}

#[test]
fn merge_from_empty_source_leaves_target_untouched() {
    let mut store = seeded_store("merge_empty_source", StoreOptions::default());
    let a = say(&mut store, "main", "a");
    store
        .create_ref(CreateRefRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            ref_name: "empty".to_string(),
            if_absent: false,
        })
        .expect("create empty ref");

    let err = store
        .merge(merge_request("main", "empty"))
        .expect_err("empty source");
    assert!(matches!(err, StoreError::SourceTipUnavailable(ref name) if name == "empty"));

    let main = ref_row(&mut store, "main");
    assert_eq!(main.tip_commit.as_deref(), Some(a.commit.commit_id.as_str()));
    assert_eq!(main.length, 1);
}

#[test]
fn merge_records_both_parents_and_moves_only_the_target() {
    let mut store = seeded_store("merge_parents", StoreOptions::default());
    say(&mut store, "main", "a");
    branch(&mut store, "main", "feat");
    let d = say(&mut store, "feat", "d");
    let e = say(&mut store, "feat", "e");
    let c = say(&mut store, "main", "c");

    let merged = store.merge(merge_request("main", "feat")).expect("merge");
    assert_eq!(merged.commit.ordinal, 2);
    assert_eq!(merged.source_commit, e.commit.commit_id);
    assert_eq!(merged.payload.merge_from, "feat");
    assert_eq!(merged.payload.source_commit, e.commit.commit_id);
    assert_eq!(
        merged.payload.source_node_ids,
        vec![d.commit.node_id.clone(), e.commit.node_id.clone()]
    );

    let record = store
        .show_node(ShowNodeRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            node_id: merged.commit.node_id.clone(),
        })
        .expect("show merge node");
    assert_eq!(record.commit.parent1.as_deref(), Some(c.commit.commit_id.as_str()));
    assert_eq!(record.commit.parent2.as_deref(), Some(e.commit.commit_id.as_str()));
    assert_eq!(record.commit.message, "merge feat into main");
    match &record.node.payload {
        NodePayload::Merge(payload) => assert_eq!(payload.id, merged.commit.node_id),
        other => panic!("expected merge payload, got {other:?}"),
    }

    assert_eq!(
        ref_row(&mut store, "feat").tip_commit.as_deref(),
        Some(e.commit.commit_id.as_str())
    );
    assert_eq!(
        ref_row(&mut store, "main").tip_commit.as_deref(),
        Some(merged.commit.commit_id.as_str())
    );
}

#[test]
fn merge_keeps_the_source_head_last() {
    let mut store = seeded_store("merge_head_last", StoreOptions::default());
    say(&mut store, "main", "a");
    branch(&mut store, "main", "feat");
    let d = say(&mut store, "feat", "d");
    let e = say(&mut store, "feat", "e");

    let merged = store
        .merge(MergeRequest {
            source_node_ids: Some(vec![e.commit.node_id.clone(), d.commit.node_id.clone()]),
            ..merge_request("main", "feat")
        })
        .expect("merge");
    assert_eq!(
        merged.payload.source_node_ids,
        vec![d.commit.node_id.clone(), e.commit.node_id.clone()]
    );

    let err = store
        .merge(merge_request("main", "main"))
        .expect_err("self merge");
    assert_eq!(err.code(), "VALIDATION");
}

#[test]
fn rename_moves_history_and_default_ref() {
    let mut store = seeded_store("rename_ref", StoreOptions::default());
    let a = say(&mut store, "main", "a");
    branch(&mut store, "main", "feat");

    let renamed = store
        .rename_ref(RenameRefRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            from: "feat".to_string(),
            to: "idea".to_string(),
        })
        .expect("rename");
    assert_eq!(renamed.name, "idea");
    assert_eq!(renamed.length, 1);
    assert_eq!(history_ids(&mut store, "idea"), vec![a.commit.node_id.clone()]);

    let err = store
        .get_history(HistoryRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            ref_name: "feat".to_string(),
            limit: 10,
            before_ordinal: None,
        })
        .expect_err("old name is gone");
    assert!(matches!(err, StoreError::RefNotFound(_)));

    let err = store
        .rename_ref(RenameRefRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            from: "idea".to_string(),
            to: "main".to_string(),
        })
        .expect_err("target taken");
    assert_eq!(err.code(), "CONFLICT");

    store
        .rename_ref(RenameRefRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            from: "main".to_string(),
            to: "trunk".to_string(),
        })
        .expect("rename default ref");
    let project = store.get_project(USER, PROJECT).expect("project");
    assert_eq!(project.default_ref, "trunk");
}

#[test]
fn history_pages_backwards_from_the_tip() {
    let mut store = seeded_store("history_paging", StoreOptions::default());
    let ids: Vec<String> = (0..5)
        .map(|i| say(&mut store, "main", &format!("m{i}")).commit.node_id)
        .collect();

    let page = |store: &mut SqliteStore, before_ordinal: Option<i64>| {
        store
            .get_history(HistoryRequest {
                user_id: USER.to_string(),
                project_id: PROJECT.to_string(),
                ref_name: "main".to_string(),
                limit: 2,
                before_ordinal,
            })
            .expect("history page")
    };

    let first = page(&mut store, None);
    let ordinals: Vec<i64> = first.entries.iter().map(|e| e.ordinal).collect();
    assert_eq!(ordinals, vec![3, 4]);
    assert_eq!(first.entries[1].node.id, ids[4]);
    assert!(first.has_more);
    assert_eq!(first.next_cursor, Some(3));

    let second = page(&mut store, first.next_cursor);
    let ordinals: Vec<i64> = second.entries.iter().map(|e| e.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2]);
    assert_eq!(second.next_cursor, Some(1));

    let last = page(&mut store, second.next_cursor);
    assert_eq!(last.entries.len(), 1);
    assert_eq!(last.entries[0].node.id, ids[0]);
    assert!(!last.has_more);
    assert_eq!(last.next_cursor, None);

    let err = store
        .get_history(HistoryRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            ref_name: "main".to_string(),
            limit: 0,
            before_ordinal: None,
        })
        .expect_err("zero limit");
    assert_eq!(err.code(), "VALIDATION");
}

#[test]
fn history_limit_is_clamped_to_the_page_cap() {
    let options = StoreOptions {
        history_page_cap: 3,
        ..StoreOptions::default()
    };
    let mut store = seeded_store("history_cap", options);
    for i in 0..5 {
        say(&mut store, "main", &format!("m{i}"));
    }

    let page = store
        .get_history(HistoryRequest {
            user_id: USER.to_string(),
            project_id: PROJECT.to_string(),
            ref_name: "main".to_string(),
            limit: 100,
            before_ordinal: None,
        })
        .expect("history");
    assert_eq!(page.entries.len(), 3);
    assert!(page.has_more);
    assert_eq!(page.next_cursor, Some(2));
}
