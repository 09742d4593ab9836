#![forbid(unsafe_code)]

mod cli;
mod commands;
mod render;

use clap::Parser;
use cli::Cli;
use loom_storage::{SqliteStore, StoreError, StoreOptions};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn to_json(&self) -> serde_json::Value {
        match self {
            CliError::Store(err) => render::store_error(err),
            CliError::Json(err) => render::error("STORE_ERROR", &err.to_string(), false),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOOM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<serde_json::Value, CliError> {
    let mut options = StoreOptions::default();
    if let Some(lock_wait) = cli.lock_wait() {
        options = options.with_lock_wait(lock_wait);
    }
    let mut store = SqliteStore::open_with(&cli.storage_dir, options)?;
    tracing::debug!(
        storage_dir = %store.storage_dir().display(),
        lock_wait = ?store.options().lock_wait,
        "store open"
    );
    let user = cli.user.unwrap_or_default();
    commands::run(&mut store, &user, cli.command)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();
    match run(cli) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err.to_json())?);
            Err(err.into())
        }
    }
}
