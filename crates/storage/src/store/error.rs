#![forbid(unsafe_code)]

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    ResetRequired(&'static str),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("user {user} is not a member of project {project}")]
    NotAuthorized { project: String, user: String },
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error("project already exists: {0}")]
    ProjectAlreadyExists(String),
    #[error("only the project owner may {0}")]
    OwnerRequired(&'static str),
    #[error("unknown ref: {0}")]
    RefNotFound(String),
    #[error("ref already exists: {0}")]
    RefAlreadyExists(String),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("node {node} is not on ref {ref_name}")]
    NodeNotOnRef { node: String, ref_name: String },
    #[error("source ref {0} has no commits")]
    SourceTipUnavailable(String),
    #[error("stale draft (expected={expected}, stored={})", .stored.as_deref().unwrap_or("none"))]
    StaleDraft {
        expected: String,
        stored: Option<String>,
    },
    #[error("lock timeout after {waited_ms}ms ({key})")]
    LockTimeout { key: String, waited_ms: u64 },
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::Json(_) => "STORE_ERROR",
            Self::Sql(err) if is_busy(err) => "LOCK_TIMEOUT",
            Self::Sql(_) => "STORE_ERROR",
            Self::InvalidInput(_) => "VALIDATION",
            Self::ResetRequired(_) => "RESET_REQUIRED",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::NotAuthorized { .. } | Self::OwnerRequired(_) => "NOT_AUTHORIZED",
            Self::UnknownProject(_)
            | Self::RefNotFound(_)
            | Self::UnknownNode(_)
            | Self::NodeNotOnRef { .. }
            | Self::SourceTipUnavailable(_) => "NOT_FOUND",
            Self::RefAlreadyExists(_)
            | Self::ProjectAlreadyExists(_)
            | Self::StaleDraft { .. } => "CONFLICT",
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
        }
    }

    /// Lock timeouts and conflicts clear up on their own; everything else
    /// fails the same way on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), "LOCK_TIMEOUT" | "CONFLICT")
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::DatabaseBusy || failure.code == ErrorCode::DatabaseLocked
    )
}
