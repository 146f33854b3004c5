//! Second-level (namespace) caches.
//!
//! A namespace cache is a [`PerpetualCache`] wrapped by decorators in a fixed order,
//! innermost first: eviction, scheduled clearing, copy-on-access, hit logging. The result
//! sits behind a [`SharedCache`] mutex so many sessions can use it. Sessions never write to
//! it directly: writes go through a [`TransactionalCacheManager`] and land at commit.

mod builder;
mod decorators;
mod key;
mod perpetual;
mod shared;
mod transactional;

use std::fmt;
use std::sync::Arc;

use crate::results::ResultSet;

pub use builder::CacheBuilder;
pub use decorators::{CopyOnAccessCache, FifoCache, LoggingCache, LruCache, ScheduledCache};
pub use key::{CacheKey, KeyComponent};
pub use perpetual::PerpetualCache;
pub use shared::SharedCache;
pub use transactional::{TransactionalCache, TransactionalCacheManager};

/// Cached value: a shared, immutable result set.
pub type CachedResult = Arc<ResultSet>;

/// A mapping store. Decorators wrap another `Cache` and add one policy each.
pub trait Cache: Send + fmt::Debug {
    fn id(&self) -> &str;

    fn put(&mut self, key: CacheKey, value: CachedResult);

    fn get(&mut self, key: &CacheKey) -> Option<CachedResult>;

    fn remove(&mut self, key: &CacheKey) -> Option<CachedResult>;

    fn clear(&mut self);

    fn size(&self) -> usize;

    /// Hit ratio, for layers that keep statistics.
    fn hit_ratio(&self) -> Option<f64> {
        None
    }
}
