/// Feed handlers - read-only listing pages
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use super::{cached_page, page_param, AppState};
use crate::error::Result;
use crate::middleware::{AuthUser, MaybeUser};

/// Cache view name of the global feed
pub const INDEX_VIEW: &str = "index_page";

/// Global feed, served through the page cache
pub async fn index(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let requested = page_param(&req);
    let feed = state.feed();
    cached_page(&state, &req, INDEX_VIEW, move || async move {
        let page = feed.global(requested.as_deref()).await?;
        Ok(json!({ "page": page }))
    })
    .await
}

/// Most recent posts of a group
pub async fn group_posts(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let feed = state
        .feed()
        .group(&path.into_inner(), page_param(&req).as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "group": feed.group,
        "page": feed.page,
    })))
}

/// Posts by the authors the caller follows
pub async fn follow_index(
    user: AuthUser,
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let page = state
        .feed()
        .follow_feed(user.0.id, page_param(&req).as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "page": page })))
}

/// An author's posts with follow state and counts
pub async fn profile(
    viewer: MaybeUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let feed = state
        .feed()
        .profile(
            &path.into_inner(),
            viewer.0.as_ref().map(|u| u.id),
            page_param(&req).as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "user_profile": feed.author,
        "page": feed.page,
        "following": feed.following,
        "followers_count": feed.followers_count,
        "following_count": feed.following_count,
        "posts_count": feed.posts_count,
    })))
}

/// A single post with its comments
pub async fn post_view(
    state: web::Data<AppState>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse> {
    let (username, post_id) = path.into_inner();
    let detail = state.feed().post_detail(&username, post_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "post": detail.post,
        "user_profile": detail.author,
        "comments": detail.comments,
        "comments_count": detail.comments_count,
        "posts_count": detail.posts_count,
        "form": { "text": "" },
    })))
}
