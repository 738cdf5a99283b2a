//! In-process page cache backed by a concurrent map
//!
//! Deadlines use `tokio::time::Instant`, so a paused test runtime can move
//! the clock past a TTL without sleeping. Every write sweeps expired
//! entries and the map never holds more than `max_entries` pages.

use crate::{CacheMetrics, CacheResult, PageCache};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default bound on stored pages
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct MemoryPageCache {
    entries: Arc<DashMap<String, Entry>>,
    max_entries: usize,
    metrics: CacheMetrics,
}

impl Default for MemoryPageCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries,
            metrics: CacheMetrics::new(),
        }
    }

    /// Number of stored entries, expired ones included until touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl PageCache for MemoryPageCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone());

        match hit {
            Some(value) => {
                debug!(key = %key, "Page cache hit");
                self.metrics.record_hit(key);
                Ok(Some(value))
            }
            None => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                debug!(key = %key, "Page cache miss");
                self.metrics.record_miss(key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);

        if self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            debug!(key = %key, max_entries = self.max_entries, "Page cache full, skipping write");
            return Ok(());
        }

        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        debug!(key = %key, ttl_secs = ttl.as_secs(), "Page cache set");
        self.metrics.record_write(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.clear();
        debug!("Page cache cleared");
        self.metrics.record_clear("memory");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
