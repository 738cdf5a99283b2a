//! Prometheus metrics for blog-service.
//!
//! Collectors are registered with the default registry on first use and
//! exposed by the `/metrics` handler.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::Once;

lazy_static! {
    /// HTTP requests by method, route pattern and status.
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_http_requests_total",
        "Total HTTP requests segmented by method, route and status",
        &["method", "route", "status"]
    )
    .expect("failed to register blog_http_requests_total");

    /// HTTP request latency by method and route pattern.
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "blog_http_request_duration_seconds",
        "HTTP request duration segmented by method and route",
        &["method", "route"]
    )
    .expect("failed to register blog_http_request_duration_seconds");

    /// Posts published.
    pub static ref POSTS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "blog_posts_created_total",
        "Total posts published"
    )
    .expect("failed to register blog_posts_created_total");

    /// Post edits segmented by outcome (updated/denied).
    pub static ref POST_EDITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_post_edits_total",
        "Post edit attempts segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register blog_post_edits_total");

    /// Comments added.
    pub static ref COMMENTS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "blog_comments_created_total",
        "Total comments added"
    )
    .expect("failed to register blog_comments_created_total");

    /// Follow and unfollow requests segmented by outcome.
    pub static ref FOLLOW_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_follow_events_total",
        "Follow graph changes segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register blog_follow_events_total");

    /// Form submissions rejected by validation, per form.
    pub static ref VALIDATION_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blog_validation_failures_total",
        "Rejected form submissions segmented by form",
        &["form"]
    )
    .expect("failed to register blog_validation_failures_total");
}

static CACHE_METRICS: Once = Once::new();

/// Register the page cache collectors with the default registry.
pub fn init() {
    CACHE_METRICS.call_once(|| {
        if let Err(err) = page_cache::CacheMetrics::register(prometheus::default_registry()) {
            tracing::warn!("failed to register page cache metrics: {}", err);
        }
    });
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
