//! Redis page cache
//!
//! Entries are written with SET EX so Redis owns expiry. `clear` walks the
//! versioned page prefix with SCAN instead of KEYS to avoid blocking Redis.

use crate::{CacheError, CacheKey, CacheMetrics, CacheResult, PageCache};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared Redis connection manager
pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

#[derive(Clone)]
pub struct RedisPageCache {
    redis: SharedRedis,
    metrics: CacheMetrics,
}

impl RedisPageCache {
    pub fn new(redis: SharedRedis) -> Self {
        Self {
            redis,
            metrics: CacheMetrics::new(),
        }
    }

    /// Connect to `url` and wrap the connection manager
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }

    /// Round-trip PING for readiness checks
    pub async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        let pong: String = redis::cmd("PING").query_async(&mut *conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::InvalidData(format!(
                "unexpected PING response: {pong}"
            )))
        }
    }
}

#[async_trait::async_trait]
impl PageCache for RedisPageCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.redis.lock().await;

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(page)) => {
                debug!(key = %key, "Page cache hit");
                self.metrics.record_hit(key);
                Ok(Some(page))
            }
            Ok(None) => {
                debug!(key = %key, "Page cache miss");
                self.metrics.record_miss(key);
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Redis get error");
                self.metrics.record_error(key, "redis");
                Err(CacheError::Redis(e))
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        // SET EX rejects 0
        let secs = ttl.as_secs().max(1);
        let mut conn = self.redis.lock().await;
        conn.set_ex::<_, _, ()>(key, value, secs).await.map_err(|e| {
            self.metrics.record_error(key, "redis");
            CacheError::Redis(e)
        })?;

        debug!(key = %key, ttl_secs = secs, "Page cache set");
        self.metrics.record_write(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let pattern = CacheKey::all_pages_pattern();
        let mut conn = self.redis.lock().await;
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut *conn)
                .await?;

            if !keys.is_empty() {
                let mut pipe = Pipeline::new();
                for key in &keys {
                    pipe.del(key);
                }
                pipe.query_async::<_, ()>(&mut *conn).await?;
                total_deleted += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted = total_deleted, "Page cache cleared");
        self.metrics.record_clear("redis");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn health_check(&self) -> CacheResult<()> {
        self.ping().await
    }
}
