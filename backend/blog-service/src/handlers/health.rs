/// Health endpoints
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

use super::AppState;

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

pub async fn health_summary(state: web::Data<AppState>) -> HttpResponse {
    match state.store.health_check().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "blog-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "error": "store unavailable",
                "service": "blog-service"
            }))
        }
    }
}

pub async fn readiness(state: web::Data<AppState>) -> HttpResponse {
    let mut checks = HashMap::new();
    let mut ready = true;

    let start = Instant::now();
    let store_check = match state.store.health_check().await {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "Store reachable".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => {
            ready = false;
            ComponentCheck {
                status: ComponentStatus::Unhealthy,
                message: format!("Store check failed: {}", e),
                latency_ms: start.elapsed().as_millis() as u64,
            }
        }
    };
    checks.insert("store".to_string(), store_check);

    // the page cache degrades to uncached renders, so it never blocks readiness
    let start = Instant::now();
    let cache_check = match state.cache.health_check().await {
        Ok(_) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: format!("{} page cache reachable", state.cache.backend()),
            latency_ms: start.elapsed().as_millis() as u64,
        },
        Err(e) => ComponentCheck {
            status: ComponentStatus::Unhealthy,
            message: format!("{} page cache check failed: {}", state.cache.backend(), e),
            latency_ms: start.elapsed().as_millis() as u64,
        },
    };
    checks.insert("page_cache".to_string(), cache_check);

    let response = ReadinessResponse {
        ready,
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}
