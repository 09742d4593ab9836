#![forbid(unsafe_code)]

//! SQLite-backed history ledger for loom.
//!
//! [`SqliteStore`] owns the projects, refs, commits, nodes, artifacts, drafts
//! and stars of every project in one database file, and runs each mutation as
//! a single `IMMEDIATE` transaction behind a per-ref bounded-wait lock.

mod store;

pub use store::*;
