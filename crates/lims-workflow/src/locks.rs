//! Keyed locks for batch creation and bulk status updates.
//!
//! A caller acquires every key it needs in one step, so two callers never
//! hold half of each other's keys. Disjoint key sets proceed in parallel.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex};

use crate::error::{Result, WorkflowError};

/// Registry of currently held resource keys.
#[derive(Debug, Default)]
pub struct ResourceLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until all `keys` are free, then hold them until the guard drops.
    pub fn acquire<I, K>(&self, keys: I) -> Result<ResourceGuard<'_>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let mut held = self.held.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        while keys.iter().any(|key| held.contains(key)) {
            held = self
                .released
                .wait(held)
                .map_err(|_| WorkflowError::LockPoisoned)?;
        }
        held.extend(keys.iter().cloned());
        tracing::trace!(count = keys.len(), "resource keys acquired");
        Ok(ResourceGuard { locks: self, keys })
    }

    /// Acquire without waiting; `None` if any key is already held.
    pub fn try_acquire<I, K>(&self, keys: I) -> Result<Option<ResourceGuard<'_>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let mut held = self.held.lock().map_err(|_| WorkflowError::LockPoisoned)?;
        if keys.iter().any(|key| held.contains(key)) {
            return Ok(None);
        }
        held.extend(keys.iter().cloned());
        Ok(Some(ResourceGuard { locks: self, keys }))
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(key))
            .unwrap_or(false)
    }
}

/// Releases its keys on drop.
#[derive(Debug)]
pub struct ResourceGuard<'a> {
    locks: &'a ResourceLocks,
    keys: BTreeSet<String>,
}

impl ResourceGuard<'_> {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.locks.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

/// Lock key for a single sample.
pub fn sample_key(lab_number: &lims_model::LabNumber) -> String {
    format!("sample:{lab_number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn overlapping_keys_are_exclusive() {
        let locks = ResourceLocks::new();
        let guard = locks.acquire(["a", "b"]).unwrap();
        assert!(locks.try_acquire(["b", "c"]).unwrap().is_none());
        assert!(locks.try_acquire(["c"]).unwrap().is_some());
        drop(guard);
        assert!(locks.try_acquire(["b", "c"]).unwrap().is_some());
    }

    #[test]
    fn guard_releases_on_drop() {
        let locks = ResourceLocks::new();
        {
            let _guard = locks.acquire(["sample:1"]).unwrap();
            assert!(locks.is_held("sample:1"));
        }
        assert!(!locks.is_held("sample:1"));
    }

    #[test]
    fn contended_key_serializes_writers() {
        let locks = Arc::new(ResourceLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.acquire(["plate"]).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(2));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
