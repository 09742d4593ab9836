#![forbid(unsafe_code)]

use std::time::Duration;

pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(3);
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HISTORY_PAGE_CAP: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long a mutation waits for its ref lock before failing.
    pub lock_wait: Duration,
    /// SQLite `busy_timeout` for cross-handle write contention.
    pub busy_timeout: Duration,
    pub history_page_cap: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_wait: DEFAULT_LOCK_WAIT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            history_page_cap: DEFAULT_HISTORY_PAGE_CAP,
        }
    }
}

impl StoreOptions {
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }
}
