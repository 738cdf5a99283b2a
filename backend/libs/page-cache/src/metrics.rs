//! Cache metrics for observability

use crate::keys::CacheKey;
use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<CacheMetricsInner> = OnceLock::new();

struct CacheMetricsInner {
    hits: CounterVec,
    misses: CounterVec,
    writes: CounterVec,
    clears: CounterVec,
    errors: CounterVec,
}

impl CacheMetricsInner {
    fn new() -> Self {
        Self {
            hits: CounterVec::new(
                Opts::new("page_cache_hits_total", "Total page cache hits"),
                &["view"],
            )
            .expect("valid metric definition"),
            misses: CounterVec::new(
                Opts::new("page_cache_misses_total", "Total page cache misses"),
                &["view"],
            )
            .expect("valid metric definition"),
            writes: CounterVec::new(
                Opts::new("page_cache_writes_total", "Total page cache writes"),
                &["view"],
            )
            .expect("valid metric definition"),
            clears: CounterVec::new(
                Opts::new("page_cache_clears_total", "Total full page cache clears"),
                &["backend"],
            )
            .expect("valid metric definition"),
            errors: CounterVec::new(
                Opts::new("page_cache_errors_total", "Total page cache errors"),
                &["view", "error_type"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.writes.clone()))?;
        registry.register(Box::new(self.clears.clone()))?;
        registry.register(Box::new(self.errors.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static CacheMetricsInner {
    METRICS.get_or_init(CacheMetricsInner::new)
}

/// Cache metrics wrapper
#[derive(Clone, Default)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_hit(&self, key: &str) {
        get_metrics()
            .hits
            .with_label_values(&[CacheKey::view_of(key)])
            .inc();
    }

    pub fn record_miss(&self, key: &str) {
        get_metrics()
            .misses
            .with_label_values(&[CacheKey::view_of(key)])
            .inc();
    }

    pub fn record_write(&self, key: &str) {
        get_metrics()
            .writes
            .with_label_values(&[CacheKey::view_of(key)])
            .inc();
    }

    pub fn record_clear(&self, backend: &str) {
        get_metrics().clears.with_label_values(&[backend]).inc();
    }

    pub fn record_error(&self, key: &str, error_type: &str) {
        get_metrics()
            .errors
            .with_label_values(&[CacheKey::view_of(key), error_type])
            .inc();
    }
}
