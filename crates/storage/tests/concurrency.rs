#![forbid(unsafe_code)]

use loom_core::model::{NodeContent, Role};
use loom_storage::{
    AppendNodeRequest, CreateProjectRequest, HistoryRequest, ListRefsRequest, LockKey,
    SqliteStore, StoreError, StoreOptions,
};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

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

fn seeded_store(test_name: &str, options: StoreOptions) -> SqliteStore {
    let mut store = SqliteStore::open_with(temp_dir(test_name), options).expect("open store");
    store
        .create_project(CreateProjectRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            name: "Project one".to_string(),
            description: None,
        })
        .expect("create project");
    store
}

fn append(ref_name: &str, text: &str) -> AppendNodeRequest {
    AppendNodeRequest {
        user_id: "alice".to_string(),
        project_id: "p1".to_string(),
        ref_name: ref_name.to_string(),
        content: NodeContent::Message {
            role: Role::Assistant,
            content: text.to_string(),
            raw_response: None,
        },
        message: None,
        ensure_ref: true,
        commit_draft: false,
    }
}

#[test]
fn concurrent_appends_to_one_ref_stay_linear() {
    let store = seeded_store("concurrent_appends", StoreOptions::default());
    const PER_THREAD: usize = 10;

    let workers: Vec<_> = (0..2)
        .map(|worker| {
            let mut handle = store.reopen().expect("reopen store");
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    handle
                        .append_node(append("main", &format!("w{worker}-{i}")))
                        .expect("append");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }

    let mut store = store;
    let page = store
        .get_history(HistoryRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            ref_name: "main".to_string(),
            limit: 100,
            before_ordinal: None,
        })
        .expect("history");
    assert_eq!(page.entries.len(), 2 * PER_THREAD);
    for (expected, entry) in page.entries.iter().enumerate() {
        assert_eq!(entry.ordinal, expected as i64);
    }
    for pair in page.entries.windows(2) {
        assert_eq!(pair[1].node.parent_id.as_deref(), Some(pair[0].node.id.as_str()));
    }

    let main = store
        .list_refs(ListRefsRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
        })
        .expect("list refs")
        .into_iter()
        .find(|row| row.name == "main")
        .expect("main listed");
    let last = page.entries.last().expect("non-empty history");
    assert_eq!(main.tip_commit.as_deref(), Some(last.node.commit_id.as_str()));
    assert_eq!(main.length, (2 * PER_THREAD) as i64);
}

#[test]
fn held_ref_lock_times_out_and_releases() {
    let options = StoreOptions::default().with_lock_wait(Duration::from_millis(50));
    let mut store = seeded_store("lock_timeout", options);

    let guard = store
        .locks()
        .acquire(LockKey::for_ref("p1", "main"), Duration::from_millis(50))
        .expect("hold main");

    let err = store
        .append_node(append("main", "blocked"))
        .expect_err("main is held");
    assert!(matches!(err, StoreError::LockTimeout { .. }));
    assert_eq!(err.code(), "LOCK_TIMEOUT");
    assert!(err.is_retryable());

    // Other refs are unaffected.
    store
        .append_node(append("side", "free"))
        .expect("append to another ref");

    drop(guard);
    let appended = store
        .append_node(append("main", "after release"))
        .expect("append after release");
    assert_eq!(appended.commit.ordinal, 0);
}

#[test]
fn reopened_handles_share_lock_registry() {
    let options = StoreOptions::default().with_lock_wait(Duration::from_millis(50));
    let store = seeded_store("shared_locks", options.clone());
    let mut other = store.reopen().expect("reopen");
    assert_eq!(other.storage_dir(), store.storage_dir());
    assert_eq!(other.options(), &options);

    let guard = store
        .locks()
        .acquire(LockKey::for_ref("p1", "main"), Duration::from_millis(50))
        .expect("hold main");
    let err = other
        .append_node(append("main", "blocked"))
        .expect_err("lock shared across handles");
    assert_eq!(err.code(), "LOCK_TIMEOUT");
    drop(guard);

    other
        .append_node(append("main", "ok"))
        .expect("append after release");
    assert_eq!(store.locks().tracked(), 0);
}
