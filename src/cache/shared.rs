use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{Cache, CacheKey, CachedResult};

/// The outermost layer of a namespace cache: one mutex around the whole decorator chain, so
/// sessions on different threads can share it.
#[derive(Debug)]
pub struct SharedCache {
    id: String,
    inner: Mutex<Box<dyn Cache>>,
}

impl SharedCache {
    #[must_use]
    pub fn new(cache: Box<dyn Cache>) -> Self {
        Self {
            id: cache.id().to_string(),
            inner: Mutex::new(cache),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Cache>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedResult> {
        self.lock().get(key)
    }

    pub fn put(&self, key: CacheKey, value: CachedResult) {
        self.lock().put(key, value);
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CachedResult> {
        self.lock().remove(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    #[must_use]
    pub fn hit_ratio(&self) -> Option<f64> {
        self.lock().hit_ratio()
    }

    /// Apply a transaction's buffered changes under one lock: clear, then removals, then
    /// writes.
    pub(crate) fn apply_commit<R, W>(&self, clear: bool, removals: R, writes: W)
    where
        R: IntoIterator<Item = CacheKey>,
        W: IntoIterator<Item = (CacheKey, CachedResult)>,
    {
        let mut cache = self.lock();
        if clear {
            cache.clear();
        }
        let mut removed = 0usize;
        for key in removals {
            cache.remove(&key);
            removed += 1;
        }
        let mut written = 0usize;
        for (key, value) in writes {
            cache.put(key, value);
            written += 1;
        }
        trace!(cache = %self.id, clear, removed, written, "committed cache overlay");
    }
}
