//! Compute-once cache of loaded scenario sets.
//!
//! Each resolved mock-file path owns a slot. The first caller for a path
//! parses it while holding that slot's lock; everyone else gets the published
//! `Arc<ScenarioSet>`. Failed loads publish nothing and give their slot back,
//! so the next call retries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{MockError, Result};
use crate::paths::MockPaths;
use crate::scenario::ScenarioSet;

type Slot = Arc<Mutex<Option<Arc<ScenarioSet>>>>;

/// Loads mock files for one command type and caches the compiled result.
#[derive(Debug)]
pub struct ScenarioStore {
    paths: MockPaths,
    slots: Mutex<HashMap<PathBuf, Slot>>,
    parses: AtomicU64,
}

impl ScenarioStore {
    pub fn new(paths: MockPaths) -> Self {
        Self {
            paths,
            slots: Mutex::new(HashMap::new()),
            parses: AtomicU64::new(0),
        }
    }

    pub fn paths(&self) -> &MockPaths {
        &self.paths
    }

    /// Resolve a relative mock-file identifier to its cache key.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        self.paths
            .mock_file(rel)
            .map_err(|reason| MockError::InvalidMockFile {
                path: PathBuf::from(rel),
                reason,
            })
    }

    /// Load (or return the cached) scenario set for `rel`.
    pub fn load(&self, rel: &str) -> Result<Arc<ScenarioSet>> {
        let path = self.resolve(rel)?;
        self.load_path(&path)
    }

    /// Load (or return the cached) scenario set at an already-resolved path.
    pub fn load_path(&self, path: &Path) -> Result<Arc<ScenarioSet>> {
        let slot = self.slot(path);
        let mut guard = lock(&slot);
        if let Some(set) = guard.as_ref() {
            tracing::debug!(source = %path.display(), "scenario cache hit");
            return Ok(Arc::clone(set));
        }
        let set = match ScenarioSet::load(path) {
            Ok(set) => Arc::new(set),
            Err(err) => {
                drop(guard);
                self.discard_empty(path, &slot);
                return Err(err);
            }
        };
        self.parses.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            source = %path.display(),
            scenarios = set.len(),
            "loaded mock file"
        );
        *guard = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Drop the cached set for `rel` so the next load re-reads it.
    pub fn invalidate(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        if lock(&self.slots).remove(&path).is_some() {
            tracing::debug!(source = %path.display(), "scenario cache invalidated");
        }
        Ok(())
    }

    pub fn invalidate_all(&self) {
        lock(&self.slots).clear();
        tracing::debug!("scenario cache cleared");
    }

    /// Number of mock files parsed so far by this store.
    pub fn parse_count(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }

    fn slot(&self, path: &Path) -> Slot {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(path.to_path_buf()).or_default())
    }

    /// Remove `slot` from the map if it is still registered for `path` and
    /// nothing was published into it.
    fn discard_empty(&self, path: &Path, slot: &Slot) {
        let mut slots = lock(&self.slots);
        let registered = slots
            .get(path)
            .is_some_and(|current| Arc::ptr_eq(current, slot));
        if registered && lock(slot).is_none() {
            slots.remove(path);
        }
    }
}

// A panic while loading leaves only a `None` or a complete set behind, so a
// poisoned lock is still safe to use.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
