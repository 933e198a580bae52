//! Render results keyed by repository path and validated by mtime.
//!
//! An entry is valid only while the file's modification timestamp equals the
//! stored one. Lookup and insertion each take the lock once; rendering happens
//! outside it, so two requests for the same stale file may both recompute and
//! the later insert wins.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::RenderResult;

#[derive(Default)]
struct Entries {
    map: FxHashMap<String, Arc<RenderResult>>,
    /// Insertion order, consulted only when a capacity is set.
    order: VecDeque<String>,
}

/// Shared render cache.
pub struct RenderCache {
    entries: Mutex<Entries>,
    /// `0` = unbounded.
    capacity: usize,
}

impl RenderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity,
        }
    }

    /// Cached result for `rel`, if it was produced at exactly `mtime`.
    pub fn get(&self, rel: &str, mtime: i64) -> Option<Arc<RenderResult>> {
        let entries = self.entries.lock();
        entries
            .map
            .get(rel)
            .filter(|cached| cached.mtime == mtime)
            .cloned()
    }

    /// Store `result`, replacing any previous entry for the same path.
    pub fn insert(&self, result: Arc<RenderResult>) {
        let mut entries = self.entries.lock();
        let key = result.path.clone();
        if entries.map.insert(key.clone(), result).is_some() {
            return;
        }
        if self.capacity == 0 {
            return;
        }

        entries.order.push_back(key);
        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }
}
