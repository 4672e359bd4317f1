use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::ports::cache::SnapshotCache;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

pub struct MemoryCache {
    inner: RwLock<LruCache<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or_else(|| {
            tracing::warn!("Cache max_entries was 0, defaulting to 16");
            NonZeroUsize::new(16).unwrap()
        });
        Self {
            inner: RwLock::new(LruCache::new(cap)),
        }
    }
}

impl SnapshotCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut cache = self.inner.write().map_or_else(
            |_| {
                tracing::error!("Cache lock poisoned on get('{key}'), returning miss");
                None
            },
            Some,
        )?;
        let entry = cache.get(key)?;
        if Instant::now() > entry.expires_at {
            cache.pop(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        if let Ok(mut cache) = self.inner.write() {
            cache.put(
                key.to_string(),
                CacheEntry {
                    value: value.to_string(),
                    expires_at: Instant::now() + ttl,
                },
            );
        } else {
            tracing::error!("Cache lock poisoned on set('{key}'), skipping write");
        }
    }

    fn invalidate(&self, key: &str) {
        if let Ok(mut cache) = self.inner.write() {
            cache.pop(key);
        } else {
            tracing::error!("Cache lock poisoned on invalidate('{key}'), skipping");
        }
    }
}
