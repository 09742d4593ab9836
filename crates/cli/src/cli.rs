#![forbid(unsafe_code)]

//! Command-line definitions.
//!
//! Global settings resolve flag first, then the `LOOM_*` environment
//! variable, then the default. Every subcommand maps onto one store operation
//! and prints its result as JSON.

use clap::{Args, Parser, Subcommand};
use loom_core::graph::GraphMode;
use loom_core::model::{NodeContent, Role};
use std::path::PathBuf;
use std::time::Duration;

/// loom: versioned conversation history
#[derive(Parser, Debug)]
#[command(name = "loom", version, long_about = None)]
#[command(after_help = "Log output goes to stderr; filter it with LOOM_LOG (default: warn).")]
pub(crate) struct Cli {
    /// Directory holding the store database
    #[arg(long, global = true, env = "LOOM_STORAGE_DIR", default_value = ".loom")]
    pub storage_dir: PathBuf,

    /// Caller identity; required by every command
    #[arg(long, global = true, env = "LOOM_USER")]
    pub user: Option<String>,

    /// How long a write waits for a busy ref before giving up
    #[arg(long, global = true, env = "LOOM_LOCK_WAIT_MS", value_name = "MS")]
    pub lock_wait_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn lock_wait(&self) -> Option<Duration> {
        self.lock_wait_ms.map(Duration::from_millis)
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create a project owned by the caller
    ProjectCreate {
        #[arg(long)]
        project: String,
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        description: Option<String>,
    },

    /// Add a member to a project (owner only)
    MemberAdd {
        #[arg(long)]
        project: String,
        #[arg(long)]
        member: String,
    },

    /// List project members
    Members {
        #[arg(long)]
        project: String,
    },

    /// Create an empty ref
    RefCreate {
        #[arg(long)]
        project: String,
        #[arg(long = "ref")]
        ref_name: String,
        /// Succeed without changes when the ref already exists
        #[arg(long)]
        if_absent: bool,
    },

    /// List refs with their tips and lengths
    Refs {
        #[arg(long)]
        project: String,
    },

    /// Append a message or state node to a ref
    Append {
        #[arg(long)]
        project: String,
        #[arg(long = "ref")]
        ref_name: String,
        #[command(flatten)]
        content: ContentArgs,
        #[arg(long, allow_hyphen_values = true)]
        message: Option<String>,
        /// Create the ref first when it does not exist
        #[arg(long)]
        ensure_ref: bool,
        /// Snapshot the caller's draft as an artifact at the new commit
        #[arg(long)]
        commit_draft: bool,
    },

    /// Merge a source ref into a target ref with a summary node
    Merge {
        #[arg(long)]
        project: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        source: String,
        #[arg(long, allow_hyphen_values = true)]
        summary: String,
        /// Source node ids folded in; derived from the source ref when omitted
        #[arg(long, value_delimiter = ',')]
        source_nodes: Option<Vec<String>>,
        #[arg(long, allow_hyphen_values = true)]
        canvas_diff: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        merged_content: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        message: Option<String>,
    },

    /// Create a ref that shares another ref's whole history
    Branch {
        #[arg(long)]
        project: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        new: String,
    },

    /// Create a ref whose tip is the parent of a node on a source ref
    BranchAt {
        #[arg(long)]
        project: String,
        #[arg(long = "ref")]
        ref_name: String,
        #[arg(long)]
        node: String,
        #[arg(long)]
        new: String,
    },

    /// Rename a ref in place
    Rename {
        #[arg(long)]
        project: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Star or unstar a node
    Star {
        #[arg(long)]
        project: String,
        #[arg(long)]
        node: String,
    },

    /// List starred node ids
    Stars {
        #[arg(long)]
        project: String,
    },

    /// Save the caller's canvas draft on a ref
    DraftSave {
        #[arg(long)]
        project: String,
        #[arg(long = "ref")]
        ref_name: String,
        #[arg(long)]
        kind: String,
        #[arg(long, allow_hyphen_values = true)]
        content: String,
        /// Hash the draft was edited from; a mismatch is a conflict
        #[arg(long)]
        base_hash: Option<String>,
    },

    /// Show the caller's canvas on a ref
    Canvas {
        #[arg(long)]
        project: String,
        #[arg(long = "ref")]
        ref_name: String,
    },

    /// Page through a ref's history, newest page first
    History {
        #[arg(long)]
        project: String,
        #[arg(long = "ref")]
        ref_name: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Return entries with an ordinal below this cursor
        #[arg(long, value_name = "ORDINAL")]
        before: Option<i64>,
    },

    /// Show one node with its commit
    Show {
        #[arg(long)]
        project: String,
        #[arg(long)]
        node: String,
    },

    /// Build and lay out the project graph
    Graph {
        #[arg(long)]
        project: String,
        #[arg(long)]
        active: String,
        /// Defaults to the project's default ref
        #[arg(long)]
        trunk: Option<String>,
        #[arg(long, default_value = "full", value_parser = parse_mode)]
        mode: GraphMode,
    },
}

/// Node content of an append: either a message or a state snapshot.
#[derive(Args, Debug)]
pub(crate) struct ContentArgs {
    /// Record a state node pointing at an artifact snapshot hash
    #[arg(long, value_name = "HASH", conflicts_with_all = ["role", "content"])]
    pub state: Option<String>,

    #[arg(long, default_value = "user", value_parser = parse_role)]
    pub role: Role,

    #[arg(long, allow_hyphen_values = true, required_unless_present = "state")]
    pub content: Option<String>,
}

impl ContentArgs {
    pub fn into_content(self) -> NodeContent {
        match self.state {
            Some(artifact_snapshot) => NodeContent::State { artifact_snapshot },
            None => NodeContent::Message {
                role: self.role,
                content: self.content.unwrap_or_default(),
                raw_response: None,
            },
        }
    }
}

fn parse_mode(value: &str) -> Result<GraphMode, String> {
    GraphMode::parse(value).ok_or_else(|| "expected full, collapsed or starred".to_string())
}

fn parse_role(value: &str) -> Result<Role, String> {
    Role::parse(value).ok_or_else(|| "expected user, assistant or system".to_string())
}
