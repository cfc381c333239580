use crate::error::{IndexError, RagError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::RwLock;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The maps stay consistent even if a holder panicked
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Names of indexes with a build in flight
#[derive(Clone, Default)]
pub(crate) struct BuildRegistry {
    names: Arc<Mutex<HashSet<String>>>,
}

impl BuildRegistry {
    /// Claim `name` for a build; fails with `AlreadyExists` if one is running
    pub(crate) fn reserve(&self, name: &str) -> Result<BuildGuard, RagError> {
        if !lock(&self.names).insert(name.to_string()) {
            tracing::info!("Build of '{}' already in progress", name);
            return Err(IndexError::AlreadyExists(name.to_string()).into());
        }

        Ok(BuildGuard {
            name: name.to_string(),
            names: self.names.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        lock(&self.names).contains(name)
    }
}

/// Releases a build reservation when dropped
pub(crate) struct BuildGuard {
    name: String,
    names: Arc<Mutex<HashSet<String>>>,
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        lock(&self.names).remove(&self.name);
    }
}

/// One reader/writer lock per index name
#[derive(Clone, Default)]
pub(crate) struct IndexLocks {
    locks: Arc<Mutex<HashMap<String, Arc<RwLock<()>>>>>,
}

impl IndexLocks {
    pub(crate) fn for_name(&self, name: &str) -> Arc<RwLock<()>> {
        lock(&self.locks)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Forget the lock of a deleted index; current holders keep their handle
    pub(crate) fn remove(&self, name: &str) {
        lock(&self.locks).remove(name);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.locks).len()
    }
}
