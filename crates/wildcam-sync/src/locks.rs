//! Per-source mutual exclusion
//!
//! At most one sync may run against a source at a time; a second request for
//! the same source is refused rather than queued. Different sources never
//! contend.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Registry of sources with a sync in flight
#[derive(Clone, Default)]
pub struct SourceLocks {
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl SourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `source_id`, or `None` if another run holds it
    pub fn try_acquire(&self, source_id: Uuid) -> Option<SourceLockGuard> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(source_id) {
            return None;
        }
        Some(SourceLockGuard {
            source_id,
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_locked(&self, source_id: Uuid) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&source_id)
    }
}

/// Releases the source when dropped
#[must_use = "the source is released as soon as the guard is dropped"]
pub struct SourceLockGuard {
    source_id: Uuid,
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl SourceLockGuard {
    pub fn source_id(&self) -> Uuid {
        self.source_id
    }
}

impl Drop for SourceLockGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.source_id);
    }
}
