use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{CacheKey, CachedResult, SharedCache};

/// One transaction's buffered view of a shared namespace cache.
///
/// Reads check, in order: pending removals (miss), pending writes (hit), the clear flag
/// (miss), then the shared cache. Nothing reaches the shared cache before [`commit`].
///
/// [`commit`]: TransactionalCache::commit
#[derive(Debug)]
pub struct TransactionalCache {
    delegate: Arc<SharedCache>,
    clear_on_commit: bool,
    writes: HashMap<CacheKey, CachedResult>,
    removals: HashSet<CacheKey>,
    missed: HashSet<CacheKey>,
}

impl TransactionalCache {
    #[must_use]
    pub fn new(delegate: Arc<SharedCache>) -> Self {
        Self {
            delegate,
            clear_on_commit: false,
            writes: HashMap::new(),
            removals: HashSet::new(),
            missed: HashSet::new(),
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<CachedResult> {
        if self.removals.contains(key) {
            return None;
        }
        if let Some(value) = self.writes.get(key) {
            return Some(Arc::clone(value));
        }
        let found = if self.clear_on_commit {
            None
        } else {
            self.delegate.get(key)
        };
        if found.is_none() {
            self.missed.insert(key.clone());
        }
        found
    }

    pub fn put(&mut self, key: CacheKey, value: CachedResult) {
        self.removals.remove(&key);
        self.writes.insert(key, value);
    }

    pub fn remove(&mut self, key: &CacheKey) {
        self.writes.remove(key);
        self.removals.insert(key.clone());
    }

    /// Hide the shared cache for the rest of this transaction and clear it at commit.
    pub fn clear(&mut self) {
        self.clear_on_commit = true;
        self.writes.clear();
        self.removals.clear();
    }

    /// Keys looked up in this transaction that the overlay could not serve.
    #[must_use]
    pub fn missed_count(&self) -> usize {
        self.missed.len()
    }

    pub fn commit(&mut self) {
        self.delegate.apply_commit(
            self.clear_on_commit,
            self.removals.drain(),
            self.writes.drain(),
        );
        self.reset();
    }

    pub fn rollback(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.clear_on_commit = false;
        self.writes.clear();
        self.removals.clear();
        self.missed.clear();
    }
}

/// The overlays of one unit of work, keyed by namespace cache id.
#[derive(Debug, Default)]
pub struct TransactionalCacheManager {
    overlays: HashMap<String, TransactionalCache>,
}

impl TransactionalCacheManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn overlay(&mut self, cache: &Arc<SharedCache>) -> &mut TransactionalCache {
        self.overlays
            .entry(cache.id().to_string())
            .or_insert_with(|| TransactionalCache::new(Arc::clone(cache)))
    }

    /// `None` means absent; a missing entry is never an error.
    pub fn get(&mut self, cache: &Arc<SharedCache>, key: &CacheKey) -> Option<CachedResult> {
        self.overlay(cache).get(key)
    }

    pub fn put(&mut self, cache: &Arc<SharedCache>, key: CacheKey, value: CachedResult) {
        self.overlay(cache).put(key, value);
    }

    pub fn remove(&mut self, cache: &Arc<SharedCache>, key: &CacheKey) {
        self.overlay(cache).remove(key);
    }

    pub fn clear(&mut self, cache: &Arc<SharedCache>) {
        self.overlay(cache).clear();
    }

    pub fn commit(&mut self) {
        for overlay in self.overlays.values_mut() {
            overlay.commit();
        }
    }

    pub fn rollback(&mut self) {
        for overlay in self.overlays.values_mut() {
            overlay.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheBuilder;
    use crate::results::ResultSet;

    fn key(name: &str) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(name);
        key
    }

    fn value(rows_affected: usize) -> CachedResult {
        let mut rs = ResultSet::default();
        rs.rows_affected = rows_affected;
        Arc::new(rs)
    }

    #[test]
    fn writes_are_private_until_commit() {
        let shared = CacheBuilder::new("ns").build().unwrap();
        let mut tx1 = TransactionalCacheManager::new();
        let mut tx2 = TransactionalCacheManager::new();

        tx1.put(&shared, key("k"), value(1));
        assert_eq!(tx1.get(&shared, &key("k")).map(|v| v.rows_affected), Some(1));
        assert!(tx2.get(&shared, &key("k")).is_none());

        tx1.commit();
        assert_eq!(tx2.get(&shared, &key("k")).map(|v| v.rows_affected), Some(1));
    }

    #[test]
    fn rollback_discards() {
        let shared = CacheBuilder::new("ns").build().unwrap();
        let mut tx = TransactionalCacheManager::new();
        tx.put(&shared, key("k"), value(1));
        tx.rollback();
        tx.commit();
        assert_eq!(shared.size(), 0);
    }

    #[test]
    fn clear_hides_shared_entries_and_applies_at_commit() {
        let shared = CacheBuilder::new("ns").read_only(true).build().unwrap();
        shared.put(key("old"), value(1));

        let mut tx = TransactionalCacheManager::new();
        tx.clear(&shared);
        assert!(tx.get(&shared, &key("old")).is_none());
        assert!(shared.get(&key("old")).is_some());

        tx.put(&shared, key("new"), value(2));
        tx.commit();
        assert!(shared.get(&key("old")).is_none());
        assert!(shared.get(&key("new")).is_some());
    }

    #[test]
    fn removal_then_put_restores_visibility() {
        let shared = CacheBuilder::new("ns").build().unwrap();
        shared.put(key("k"), value(1));
        let mut tx = TransactionalCacheManager::new();
        tx.remove(&shared, &key("k"));
        assert!(tx.get(&shared, &key("k")).is_none());
        tx.put(&shared, key("k"), value(2));
        assert_eq!(tx.get(&shared, &key("k")).map(|v| v.rows_affected), Some(2));
        tx.commit();
        assert_eq!(shared.get(&key("k")).map(|v| v.rows_affected), Some(2));
    }
}
