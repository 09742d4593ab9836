#![forbid(unsafe_code)]

use loom_core::graph::GraphMode;
use loom_core::model::{NodeContent, NodeKind, Role};
use loom_storage::{
    AppendNodeRequest, BranchFromRefRequest, CreateProjectRequest, MergeRequest,
    ProjectGraphRequest, RefHistoriesRequest, SqliteStore, ToggleStarRequest,
};
use std::collections::HashMap;
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

/// main: a b c m, feat: a b d e, with m merging feat back into main.
/// Returns the store and node ids by label.
fn forked_and_merged(test_name: &str) -> (SqliteStore, HashMap<&'static str, String>) {
    let mut store = SqliteStore::open(temp_dir(test_name)).expect("open store");
    store
        .create_project(CreateProjectRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            name: "Graph".to_string(),
            description: None,
        })
        .expect("create project");

    let mut ids = HashMap::new();
    let mut say = |store: &mut SqliteStore, ref_name: &str, label: &'static str| {
        let appended = store
            .append_node(AppendNodeRequest {
                user_id: "alice".to_string(),
                project_id: "p1".to_string(),
                ref_name: ref_name.to_string(),
                content: NodeContent::Message {
                    role: Role::User,
                    content: label.to_string(),
                    raw_response: None,
                },
                message: None,
                ensure_ref: false,
                commit_draft: false,
            })
            .expect("append");
        ids.insert(label, appended.commit.node_id);
    };

    say(&mut store, "main", "a");
    say(&mut store, "main", "b");
    store
        .branch_from_ref(BranchFromRefRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            from_ref: "main".to_string(),
            new_ref: "feat".to_string(),
        })
        .expect("branch");
    say(&mut store, "feat", "d");
    say(&mut store, "feat", "e");
    say(&mut store, "main", "c");

    let merged = store
        .merge(MergeRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            target_ref: "main".to_string(),
            source_ref: "feat".to_string(),
            merge_summary: "bring d and e over".to_string(),
            source_node_ids: None,
            canvas_diff: Some("+ e".to_string()),
            merged_assistant_content: None,
            message: None,
        })
        .expect("merge");
    ids.insert("m", merged.commit.node_id);
    (store, ids)
}

fn graph_request(mode: GraphMode) -> ProjectGraphRequest {
    ProjectGraphRequest {
        user_id: "alice".to_string(),
        project_id: "p1".to_string(),
        active_ref: "feat".to_string(),
        trunk_ref: None,
        mode,
    }
}

#[test]
fn ref_histories_feed_the_graph_builder() {
    let (mut store, ids) = forked_and_merged("ref_histories");
    let histories = store
        .ref_histories(RefHistoriesRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            refs: Vec::new(),
        })
        .expect("ref histories");

    let names: Vec<&str> = histories.iter().map(|h| h.ref_name.as_str()).collect();
    assert_eq!(names, vec!["feat", "main"]);
    let feat: Vec<&str> = histories[0].nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        feat,
        vec![
            ids["a"].as_str(),
            ids["b"].as_str(),
            ids["d"].as_str(),
            ids["e"].as_str()
        ]
    );
    let merge = histories[1].nodes.last().expect("main has nodes");
    assert_eq!(merge.kind(), NodeKind::Merge);
    assert_eq!(merge.payload.merge_source_head(), Some(ids["e"].as_str()));
    assert_eq!(merge.parent_id.as_deref(), Some(ids["c"].as_str()));

    let err = store
        .ref_histories(RefHistoriesRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            refs: vec!["ghost".to_string()],
        })
        .expect_err("unknown ref");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn full_graph_is_laid_out_with_trunk_on_lane_zero() {
    let (mut store, ids) = forked_and_merged("graph_full");
    let graph = store
        .project_graph(graph_request(GraphMode::Full))
        .expect("project graph");

    assert!(graph.dag.warnings.is_empty());
    assert_eq!(graph.dag.nodes.len(), 6);
    let merge = graph.dag.get(&ids["m"]).expect("merge node");
    let parents: Vec<&str> = merge.parents.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(parents, vec![ids["c"].as_str(), ids["e"].as_str()]);

    assert!(!graph.layout.fallback);
    assert_eq!(graph.layout.nodes.len(), 6);
    assert_eq!(graph.layout.edges.len(), 6);
    for label in ["a", "b", "c", "m"] {
        assert_eq!(graph.layout.node(&ids[label]).expect("laid out").lane, 0, "{label}");
    }
    for label in ["d", "e"] {
        assert_eq!(graph.layout.node(&ids[label]).expect("laid out").lane, 1, "{label}");
    }
    assert_eq!(graph.layout.node(&ids["m"]).expect("laid out").row, 0);
}

#[test]
fn collapsed_graph_hides_the_linear_trunk_stretch() {
    let (mut store, ids) = forked_and_merged("graph_collapsed");
    let graph = store
        .project_graph(graph_request(GraphMode::Collapsed))
        .expect("project graph");

    let kept: Vec<&str> = graph.dag.ids();
    assert_eq!(
        kept,
        vec![
            ids["a"].as_str(),
            ids["b"].as_str(),
            ids["d"].as_str(),
            ids["e"].as_str(),
            ids["m"].as_str()
        ]
    );
    let merge = graph.dag.get(&ids["m"]).expect("merge node");
    assert_eq!(merge.parents[0].id, ids["b"]);
    assert_eq!(merge.parents[0].hidden, 1);
    assert_eq!(merge.parents[1].id, ids["e"]);
    assert_eq!(merge.parents[1].hidden, 0);

    let edge = graph
        .layout
        .edge(&ids["m"], &ids["b"])
        .expect("collapsed edge");
    assert_eq!(edge.hidden_count, Some(1));
}

#[test]
fn starred_graph_keeps_stars_root_and_active_head() {
    let (mut store, ids) = forked_and_merged("graph_starred");
    store
        .toggle_star(ToggleStarRequest {
            user_id: "alice".to_string(),
            project_id: "p1".to_string(),
            node_id: ids["c"].clone(),
        })
        .expect("star c");

    let graph = store
        .project_graph(graph_request(GraphMode::Starred))
        .expect("project graph");
    assert_eq!(
        graph.dag.ids(),
        vec![ids["a"].as_str(), ids["e"].as_str(), ids["c"].as_str()]
    );
    let head = graph.dag.get(&ids["e"]).expect("active head");
    assert_eq!(head.parents[0].id, ids["a"]);
    assert_eq!(head.parents[0].hidden, 2);
    let starred = graph.dag.get(&ids["c"]).expect("starred node");
    assert_eq!(starred.parents[0].hidden, 1);
    assert!(!graph.layout.fallback);
}
