//! Rendered page cache
//!
//! Stores fully rendered pages for a fixed time window. There is no partial
//! invalidation: an entry lives until its TTL runs out or the whole cache is
//! cleared. Two backends are provided:
//! - `RedisPageCache` for deployments with several service instances
//! - `MemoryPageCache` for single-instance runs and tests

mod error;
mod keys;
mod memory;
mod metrics;
mod redis_backend;

pub use error::{CacheError, CacheResult};
pub use keys::{CacheKey, CACHE_VERSION};
pub use memory::{MemoryPageCache, DEFAULT_MAX_ENTRIES};
pub use metrics::CacheMetrics;
pub use redis_backend::{RedisPageCache, SharedRedis};

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default TTL values (seconds)
pub mod ttl {
    pub const INDEX_PAGE: u64 = 20;
}

/// Page cache operations
#[async_trait::async_trait]
pub trait PageCache: Send + Sync {
    /// Get a rendered page, `None` on miss or expiry
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a rendered page for `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Drop every cached page
    async fn clear(&self) -> CacheResult<()>;

    /// Backend name used in health reports
    fn backend(&self) -> &'static str;

    /// Readiness probe
    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Return the cached page for `key`, or render, store and return it.
///
/// Cache failures never fail the request: a broken read falls through to
/// rendering and a broken write only loses the cached copy.
pub async fn get_or_render<F, Fut, E>(
    cache: &dyn PageCache,
    key: &str,
    ttl: Duration,
    render: F,
) -> Result<String, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, E>>,
{
    match cache.get(key).await {
        Ok(Some(page)) => return Ok(page),
        Ok(None) => {}
        Err(e) => warn!(key = %key, error = %e, "Page cache read failed, rendering uncached"),
    }

    let page = render().await?;

    if let Err(e) = cache.set(key, &page, ttl).await {
        warn!(key = %key, error = %e, "Page cache write failed");
    }

    Ok(page)
}
