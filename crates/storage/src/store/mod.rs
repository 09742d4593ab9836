#![forbid(unsafe_code)]

mod append;
mod canvas;
mod error;
mod history;
mod locks;
mod merge;
mod options;
mod project_graph;
mod projects;
mod refs;
mod requests;
mod stars;
mod support;
mod types;

pub use error::StoreError;
pub use locks::{LockGuard, LockKey, RefLocks};
pub use options::*;
pub use requests::*;
pub use types::*;

use loom_core::ids::{ProjectId, RefName, UserId};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use support::*;

pub const DEFAULT_REF: &str = "main";
const DB_FILE: &str = "loom.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
    options: StoreOptions,
    locks: Arc<RefLocks>,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(storage_dir, StoreOptions::default())
    }

    pub fn open_with(
        storage_dir: impl AsRef<Path>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = connect(&storage_dir, &options)?;
        preflight_gate(&conn)?;
        install_schema(&conn)?;

        Ok(Self {
            conn,
            storage_dir,
            options,
            locks: Arc::new(RefLocks::new()),
        })
    }

    /// A second handle on the same database that shares this handle's lock
    /// registry, so per-ref serialization holds across both.
    pub fn reopen(&self) -> Result<Self, StoreError> {
        let conn = connect(&self.storage_dir, &self.options)?;
        preflight_gate(&conn)?;
        Ok(Self {
            conn,
            storage_dir: self.storage_dir.clone(),
            options: self.options.clone(),
            locks: Arc::clone(&self.locks),
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn locks(&self) -> &Arc<RefLocks> {
        &self.locks
    }

    fn lock(&self, key: LockKey) -> Result<LockGuard, StoreError> {
        self.locks.acquire(key, self.options.lock_wait)
    }

    fn write_tx(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

fn connect(storage_dir: &Path, options: &StoreOptions) -> Result<Connection, StoreError> {
    let conn = Connection::open(storage_dir.join(DB_FILE))?;
    conn.busy_timeout(options.busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Authenticated, authorised caller of one operation.
#[derive(Clone, Debug)]
struct Caller {
    project: String,
    user: String,
    role: MemberRole,
}

fn caller_tx(conn: &Connection, project_id: &str, user_id: &str) -> Result<Caller, StoreError> {
    let user = canonicalize_user(user_id)?;
    let project = canonicalize_project(project_id)?;
    if !project_exists_tx(conn, &project)? {
        return Err(StoreError::UnknownProject(project));
    }
    match member_role_tx(conn, &project, &user)? {
        Some(role) => Ok(Caller {
            project,
            user,
            role,
        }),
        None => Err(StoreError::NotAuthorized { project, user }),
    }
}

/// Validates the identifiers a ref-scoped mutation locks on. Runs before any
/// lock is taken; membership is checked later, inside the transaction.
fn scoped_ref(
    user_id: &str,
    project_id: &str,
    ref_name: &str,
) -> Result<(String, String), StoreError> {
    canonicalize_user(user_id)?;
    Ok((canonicalize_project(project_id)?, canonicalize_ref(ref_name)?))
}

fn canonicalize_user(value: &str) -> Result<String, StoreError> {
    match UserId::try_new(value) {
        Ok(user) => Ok(user.as_str().to_string()),
        Err(loom_core::ids::UserIdError::Empty) => Err(StoreError::NotAuthenticated),
        Err(err) => Err(StoreError::InvalidInput(err.message())),
    }
}

fn canonicalize_project(value: &str) -> Result<String, StoreError> {
    ProjectId::try_new(value.trim())
        .map(ProjectId::into_string)
        .map_err(|err| StoreError::InvalidInput(err.message()))
}

fn canonicalize_ref(value: &str) -> Result<String, StoreError> {
    RefName::try_new(value)
        .map(RefName::into_string)
        .map_err(|err| StoreError::InvalidInput(err.message()))
}

fn canonicalize_node(value: &str) -> Result<String, StoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::InvalidInput("node_id must not be empty"));
    }
    Ok(value.to_string())
}

fn map_insert_conflict(err: rusqlite::Error, ref_name: &str) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::RefAlreadyExists(ref_name.to_string());
    }
    StoreError::Sql(err)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

fn sha256_hex(content: &str) -> String {
    use sha2::Digest as _;

    let digest = sha2::Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
