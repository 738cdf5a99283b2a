/// HTTP handlers for blog-service
///
/// Handlers return JSON render contexts for the templating layer, or a
/// redirect after a successful write:
/// - feed: index, group, profile, followed-authors feed, post page
/// - posts: new post, edit post, comments
/// - follow: follow / unfollow
/// - health: liveness, readiness, summary
pub mod feed;
pub mod follow;
pub mod forms;
pub mod health;
pub mod posts;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use page_cache::{CacheKey, PageCache};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::db::BlogStore;
use crate::error::{AppError, Result};
use crate::media::MediaStore;
use crate::services::{CommentService, FeedService, FollowService, PostService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlogStore>,
    pub cache: Arc<dyn PageCache>,
    pub media: Arc<dyn MediaStore>,
    /// Lifetime of a cached index page
    pub page_ttl: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BlogStore>,
        cache: Arc<dyn PageCache>,
        media: Arc<dyn MediaStore>,
        page_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            media,
            page_ttl,
        }
    }

    pub fn feed(&self) -> FeedService {
        FeedService::new(self.store.clone(), self.media.clone())
    }

    pub fn posts(&self) -> PostService {
        PostService::new(self.store.clone(), self.media.clone())
    }

    pub fn comments(&self) -> CommentService {
        CommentService::new(self.store.clone())
    }

    pub fn follows(&self) -> FollowService {
        FollowService::new(self.store.clone())
    }
}

/// Register every blog route; shared by the server and the integration tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_summary))
        .route("/health/ready", web::get().to(health::readiness))
        .route("/health/live", web::get().to(health::liveness))
        .route("/metrics", web::get().to(crate::metrics::serve_metrics))
        .route("/", web::get().to(feed::index))
        .service(
            web::resource("/new/")
                .route(web::get().to(posts::new_post_form))
                .route(web::post().to(posts::create_post)),
        )
        .route("/follow/", web::get().to(feed::follow_index))
        .route("/group/{slug}/", web::get().to(feed::group_posts))
        .service(
            web::resource("/{username}/follow/")
                .route(web::get().to(follow::profile_follow))
                .route(web::post().to(follow::profile_follow)),
        )
        .service(
            web::resource("/{username}/unfollow/")
                .route(web::get().to(follow::profile_unfollow))
                .route(web::post().to(follow::profile_unfollow)),
        )
        .route("/{username}/", web::get().to(feed::profile))
        .route("/{username}/{post_id:\\d+}/", web::get().to(feed::post_view))
        .service(
            web::resource("/{username}/{post_id:\\d+}/edit/")
                .route(web::get().to(posts::edit_post_form))
                .route(web::post().to(posts::edit_post)),
        )
        .route(
            "/{username}/{post_id:\\d+}/comment/",
            web::post().to(posts::add_comment),
        )
        .default_service(web::to(not_found));
}

/// Fallback for unknown routes
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "path": req.path() }))
}

/// Serve `view` from the page cache, rendering it on a miss.
///
/// The key is the view name plus the raw query string, so every page of a
/// listing is cached on its own.
pub async fn cached_page<F, Fut>(
    state: &AppState,
    req: &HttpRequest,
    view: &str,
    render: F,
) -> Result<HttpResponse>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<serde_json::Value>>,
{
    let key = CacheKey::page(view, req.query_string());
    let body = page_cache::get_or_render(
        state.cache.as_ref(),
        &key,
        state.page_ttl,
        move || async move {
            let context = render().await?;
            Ok::<_, AppError>(serde_json::to_string(&context)?)
        },
    )
    .await?;

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}

/// Raw `page` query parameter, if any
pub fn page_param(req: &HttpRequest) -> Option<String> {
    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.get("page").cloned())
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

pub fn profile_url(username: &str) -> String {
    format!("/{}/", username)
}

pub fn post_url(username: &str, post_id: i64) -> String {
    format!("/{}/{}/", username, post_id)
}
