use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheSettings, EvictionPolicy};
use crate::error::SqlMapperError;

use super::{
    Cache, CopyOnAccessCache, FifoCache, LoggingCache, LruCache, PerpetualCache, ScheduledCache,
    SharedCache,
};

/// Assembles a namespace cache decorator chain.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let cache = CacheBuilder::new("users")
///     .eviction(EvictionPolicy::Fifo)
///     .size(128)
///     .build()?;
/// assert_eq!(cache.id(), "users");
/// # Ok::<(), SqlMapperError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    id: String,
    eviction: EvictionPolicy,
    size: usize,
    flush_interval: Option<Duration>,
    read_only: bool,
}

impl CacheBuilder {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eviction: EvictionPolicy::Lru,
            size: CacheSettings::DEFAULT_SIZE,
            flush_interval: None,
            read_only: false,
        }
    }

    #[must_use]
    pub fn from_settings(id: impl Into<String>, settings: &CacheSettings) -> Self {
        let builder = Self::new(id)
            .eviction(settings.eviction)
            .size(settings.size)
            .read_only(settings.read_only);
        match settings.flush_interval_ms {
            Some(ms) => builder.flush_interval(Duration::from_millis(ms)),
            None => builder,
        }
    }

    #[must_use]
    pub fn eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Read-only caches hand out shared values instead of copies.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Build the chain: eviction, scheduled clearing, copy-on-access, logging, then the
    /// shared mutex.
    ///
    /// # Errors
    ///
    /// Returns `SqlMapperError::ConfigError` for a zero size.
    pub fn build(self) -> Result<Arc<SharedCache>, SqlMapperError> {
        let size = NonZeroUsize::new(self.size).ok_or_else(|| {
            SqlMapperError::config(format!("Cache '{}' must have a size above zero", self.id))
        })?;
        let base: Box<dyn Cache> = Box::new(PerpetualCache::new(self.id));
        let mut cache: Box<dyn Cache> = match self.eviction {
            EvictionPolicy::Lru => Box::new(LruCache::new(base, size)),
            EvictionPolicy::Fifo => Box::new(FifoCache::new(base, size)),
        };
        if let Some(interval) = self.flush_interval {
            cache = Box::new(ScheduledCache::new(cache, interval));
        }
        if !self.read_only {
            cache = Box::new(CopyOnAccessCache::new(cache));
        }
        cache = Box::new(LoggingCache::new(cache));
        Ok(Arc::new(SharedCache::new(cache)))
    }
}
