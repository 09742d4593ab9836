#![forbid(unsafe_code)]

//! Keyed registry of exclusive, bounded-wait locks.
//!
//! Slots are created on first use and evicted once nobody holds or waits on
//! them. Acquisition never queues indefinitely: a caller that cannot get the
//! lock within its wait budget gets [`StoreError::LockTimeout`].

use super::StoreError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Ref { project: String, name: String },
    Draft {
        project: String,
        name: String,
        user: String,
    },
    Stars { project: String },
}

impl LockKey {
    pub fn for_ref(project: &str, name: &str) -> Self {
        Self::Ref {
            project: project.to_string(),
            name: name.to_string(),
        }
    }

    pub fn for_draft(project: &str, name: &str, user: &str) -> Self {
        Self::Draft {
            project: project.to_string(),
            name: name.to_string(),
            user: user.to_string(),
        }
    }

    pub fn for_stars(project: &str) -> Self {
        Self::Stars {
            project: project.to_string(),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref { project, name } => write!(f, "ref {project}/{name}"),
            Self::Draft {
                project,
                name,
                user,
            } => write!(f, "draft {project}/{name}/{user}"),
            Self::Stars { project } => write!(f, "stars {project}"),
        }
    }
}

#[derive(Debug, Default)]
struct LockSlot {
    held: Mutex<bool>,
    released: Condvar,
}

#[derive(Debug, Default)]
pub struct RefLocks {
    slots: Mutex<HashMap<LockKey, Arc<LockSlot>>>,
}

impl RefLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(self: &Arc<Self>, key: LockKey, wait: Duration) -> Result<LockGuard, StoreError> {
        let slot = self.slot(&key);
        let started = Instant::now();
        let deadline = started + wait;

        let mut held = lock_unpoisoned(&slot.held);
        while *held {
            let now = Instant::now();
            if now >= deadline {
                drop(held);
                drop(slot);
                self.evict_if_idle(&key);
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(%key, waited_ms, "lock wait budget exhausted");
                return Err(StoreError::LockTimeout {
                    key: key.to_string(),
                    waited_ms,
                });
            }
            let (next, _) = slot
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = next;
        }
        *held = true;
        drop(held);

        Ok(LockGuard {
            registry: Arc::clone(self),
            key,
            slot: Some(slot),
        })
    }

    /// Number of keys currently tracked (held, waited on, or not yet evicted).
    pub fn tracked(&self) -> usize {
        lock_unpoisoned(&self.slots).len()
    }

    fn slot(&self, key: &LockKey) -> Arc<LockSlot> {
        let mut slots = lock_unpoisoned(&self.slots);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn evict_if_idle(&self, key: &LockKey) {
        let mut slots = lock_unpoisoned(&self.slots);
        let idle = slots
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1 && !*lock_unpoisoned(&slot.held));
        if idle {
            slots.remove(key);
        }
    }
}

/// Held lock; released (and the slot evicted when idle) on drop.
#[derive(Debug)]
pub struct LockGuard {
    registry: Arc<RefLocks>,
    key: LockKey,
    slot: Option<Arc<LockSlot>>,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            *lock_unpoisoned(&slot.held) = false;
            slot.released.notify_one();
        }
        self.registry.evict_if_idle(&self.key);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
