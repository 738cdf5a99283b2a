/// HTTP middleware for blog-service
///
/// - `SessionMiddleware` + `AuthUser` / `MaybeUser`: session identity
/// - `MetricsMiddleware`: per-route request counters and latency
pub mod session;

pub use session::{
    issue_token, AuthUser, MaybeUser, SessionMiddleware, SessionSettings, SessionUser,
};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        // route pattern keeps label cardinality bounded
        let route = req
            .match_pattern()
            .unwrap_or_else(|| "unmatched".to_string());
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await;
            let elapsed = start.elapsed();

            let status = match &res {
                Ok(resp) => resp.status().as_u16().to_string(),
                Err(err) => err.as_response_error().status_code().as_u16().to_string(),
            };
            HTTP_REQUESTS_TOTAL
                .with_label_values(&[&method, &route, &status])
                .inc();
            HTTP_REQUEST_DURATION_SECONDS
                .with_label_values(&[&method, &route])
                .observe(elapsed.as_secs_f64());

            tracing::debug!(%method, %route, %status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
            res
        })
    }
}
