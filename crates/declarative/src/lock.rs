//! Keyed mutual exclusion for resources writing the same target

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A table of named locks, created on first use
///
/// Two resources reporting the same [`Resource::lock_key`](crate::Resource::lock_key)
/// take the same lock, so their applies never interleave. Unrelated keys
/// never contend.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for `key`, creating it if needed
    pub fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Number of distinct keys seen so far
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock a handle, recovering from a poisoned mutex
///
/// A panic in another apply leaves no partial state behind the unit
/// mutex, so the guard is still usable.
pub fn lock(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
