use std::collections::HashMap;

use super::{Cache, CacheKey, CachedResult};

/// Unbounded base store.
#[derive(Debug)]
pub struct PerpetualCache {
    id: String,
    entries: HashMap<CacheKey, CachedResult>,
}

impl PerpetualCache {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: HashMap::new(),
        }
    }
}

impl Cache for PerpetualCache {
    fn id(&self) -> &str {
        &self.id
    }

    fn put(&mut self, key: CacheKey, value: CachedResult) {
        self.entries.insert(key, value);
    }

    fn get(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.entries.get(key).cloned()
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.entries.remove(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
