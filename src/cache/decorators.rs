use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache as LruKeys;
use tracing::debug;

use super::{Cache, CacheKey, CachedResult};

/// Bounded by size; evicts the least recently used key from the wrapped cache.
#[derive(Debug)]
pub struct LruCache {
    delegate: Box<dyn Cache>,
    keys: LruKeys<CacheKey, ()>,
}

impl LruCache {
    #[must_use]
    pub fn new(delegate: Box<dyn Cache>, size: NonZeroUsize) -> Self {
        Self {
            delegate,
            keys: LruKeys::new(size),
        }
    }
}

impl Cache for LruCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&mut self, key: CacheKey, value: CachedResult) {
        self.delegate.put(key.clone(), value);
        if let Some((eldest, ())) = self.keys.push(key.clone(), ())
            && eldest != key
        {
            self.delegate.remove(&eldest);
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.keys.promote(key);
        self.delegate.get(key)
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.keys.pop(key);
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn hit_ratio(&self) -> Option<f64> {
        self.delegate.hit_ratio()
    }
}

/// Bounded by size; evicts the oldest inserted key.
#[derive(Debug)]
pub struct FifoCache {
    delegate: Box<dyn Cache>,
    order: VecDeque<CacheKey>,
    size: usize,
}

impl FifoCache {
    #[must_use]
    pub fn new(delegate: Box<dyn Cache>, size: NonZeroUsize) -> Self {
        Self {
            delegate,
            order: VecDeque::new(),
            size: size.get(),
        }
    }
}

impl Cache for FifoCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&mut self, key: CacheKey, value: CachedResult) {
        if !self.order.contains(&key) {
            self.order.push_back(key.clone());
            if self.order.len() > self.size
                && let Some(oldest) = self.order.pop_front()
            {
                self.delegate.remove(&oldest);
            }
        }
        self.delegate.put(key, value);
    }

    fn get(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.delegate.get(key)
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.order.retain(|k| k != key);
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn hit_ratio(&self) -> Option<f64> {
        self.delegate.hit_ratio()
    }
}

/// Clears the wrapped cache once per `interval`, checked on every access.
#[derive(Debug)]
pub struct ScheduledCache {
    delegate: Box<dyn Cache>,
    interval: Duration,
    last_clear: Instant,
}

impl ScheduledCache {
    #[must_use]
    pub fn new(delegate: Box<dyn Cache>, interval: Duration) -> Self {
        Self {
            delegate,
            interval,
            last_clear: Instant::now(),
        }
    }

    fn clear_when_stale(&mut self) -> bool {
        if self.last_clear.elapsed() >= self.interval {
            self.clear();
            return true;
        }
        false
    }
}

impl Cache for ScheduledCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&mut self, key: CacheKey, value: CachedResult) {
        self.clear_when_stale();
        self.delegate.put(key, value);
    }

    fn get(&mut self, key: &CacheKey) -> Option<CachedResult> {
        if self.clear_when_stale() {
            return None;
        }
        self.delegate.get(key)
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.clear_when_stale();
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.last_clear = Instant::now();
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn hit_ratio(&self) -> Option<f64> {
        self.delegate.hit_ratio()
    }
}

/// Stores and hands out private copies, so no two callers share a cached value.
#[derive(Debug)]
pub struct CopyOnAccessCache {
    delegate: Box<dyn Cache>,
}

impl CopyOnAccessCache {
    #[must_use]
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self { delegate }
    }
}

impl Cache for CopyOnAccessCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&mut self, key: CacheKey, value: CachedResult) {
        self.delegate.put(key, Arc::new((*value).clone()));
    }

    fn get(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.delegate
            .get(key)
            .map(|value| Arc::new((*value).clone()))
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn hit_ratio(&self) -> Option<f64> {
        self.delegate.hit_ratio()
    }
}

/// Counts requests and hits, logging the hit ratio at debug level on every lookup.
#[derive(Debug)]
pub struct LoggingCache {
    delegate: Box<dyn Cache>,
    requests: u64,
    hits: u64,
}

impl LoggingCache {
    #[must_use]
    pub fn new(delegate: Box<dyn Cache>) -> Self {
        Self {
            delegate,
            requests: 0,
            hits: 0,
        }
    }

    fn ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.hits as f64 / self.requests as f64
    }
}

impl Cache for LoggingCache {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn put(&mut self, key: CacheKey, value: CachedResult) {
        self.delegate.put(key, value);
    }

    fn get(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.requests += 1;
        let value = self.delegate.get(key);
        if value.is_some() {
            self.hits += 1;
        }
        debug!(cache = self.delegate.id(), hit_ratio = self.ratio(), "cache lookup");
        value
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CachedResult> {
        self.delegate.remove(key)
    }

    fn clear(&mut self) {
        self.delegate.clear();
    }

    fn size(&self) -> usize {
        self.delegate.size()
    }

    fn hit_ratio(&self) -> Option<f64> {
        Some(self.ratio())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PerpetualCache;
    use crate::results::ResultSet;

    fn key(n: i64) -> CacheKey {
        let mut key = CacheKey::new();
        key.update(&crate::types::RowValues::Int(n));
        key
    }

    fn value() -> CachedResult {
        Arc::new(ResultSet::default())
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut cache = LruCache::new(Box::new(PerpetualCache::new("ns")), size(2));
        cache.put(key(1), value());
        cache.put(key(2), value());
        assert!(cache.get(&key(1)).is_some());
        cache.put(key(3), value());
        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(1)).is_some());
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn lru_reput_does_not_evict_itself() {
        let mut cache = LruCache::new(Box::new(PerpetualCache::new("ns")), size(1));
        cache.put(key(1), value());
        cache.put(key(1), value());
        assert!(cache.get(&key(1)).is_some());
    }

    #[test]
    fn fifo_evicts_oldest() {
        let mut cache = FifoCache::new(Box::new(PerpetualCache::new("ns")), size(2));
        cache.put(key(1), value());
        cache.put(key(2), value());
        assert!(cache.get(&key(1)).is_some());
        cache.put(key(3), value());
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
    }

    #[test]
    fn scheduled_clears_after_interval() {
        let mut cache = ScheduledCache::new(Box::new(PerpetualCache::new("ns")), Duration::ZERO);
        cache.put(key(1), value());
        assert!(cache.get(&key(1)).is_none());
    }

    #[test]
    fn copy_on_access_hands_out_fresh_copies() {
        let mut cache = CopyOnAccessCache::new(Box::new(PerpetualCache::new("ns")));
        let original = value();
        cache.put(key(1), Arc::clone(&original));
        let first = cache.get(&key(1)).unwrap();
        let second = cache.get(&key(1)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &original));
        assert_eq!(*first, *second);
    }

    #[test]
    fn logging_tracks_hit_ratio() {
        let mut cache = LoggingCache::new(Box::new(PerpetualCache::new("ns")));
        cache.put(key(1), value());
        cache.get(&key(1));
        cache.get(&key(2));
        assert_eq!(cache.hit_ratio(), Some(0.5));
    }
}
