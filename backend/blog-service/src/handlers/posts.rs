/// Post handlers - new post, edit post and comments
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde_json::json;

use super::{forms, post_url, redirect, AppState};
use crate::error::{AppError, Result};
use crate::metrics::{
    COMMENTS_CREATED_TOTAL, POSTS_CREATED_TOTAL, POST_EDITS_TOTAL, VALIDATION_FAILURES_TOTAL,
};
use crate::middleware::AuthUser;
use crate::services::{CommentForm, EditOutcome};

fn count_rejection(form: &str, err: AppError) -> AppError {
    if matches!(err, AppError::Validation { .. }) {
        VALIDATION_FAILURES_TOTAL.with_label_values(&[form]).inc();
    }
    err
}

/// Empty new post form
pub async fn new_post_form(_user: AuthUser) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "form": { "text": "", "group": null, "image": null },
        "is_created": true,
    })))
}

/// Publish a post and go back to the index
pub async fn create_post(
    user: AuthUser,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let form = forms::read_post_form(payload).await?;
    state
        .posts()
        .create_post(&user.0, form)
        .await
        .map_err(|e| count_rejection("post", e))?;

    POSTS_CREATED_TOTAL.inc();
    Ok(redirect("/"))
}

/// Edit form prefilled with the post; non-authors are sent to the index
pub async fn edit_post_form(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse> {
    let (username, post_id) = path.into_inner();
    match state.posts().editable_post(&username, post_id, &user.0).await? {
        Some(post) => Ok(HttpResponse::Ok().json(json!({
            "form": {
                "text": post.text,
                "group": post.group_id,
                "image": post.image,
            },
            "post": post,
        }))),
        None => Ok(redirect("/")),
    }
}

/// Apply an edit; the author lands on the post page
pub async fn edit_post(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(String, i64)>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let (username, post_id) = path.into_inner();
    let form = forms::read_post_form(payload).await?;

    let outcome = state
        .posts()
        .edit_post(&username, post_id, &user.0, form)
        .await
        .map_err(|e| count_rejection("post", e))?;

    match outcome {
        EditOutcome::Updated(post) => {
            POST_EDITS_TOTAL.with_label_values(&["updated"]).inc();
            Ok(redirect(&post_url(&post.author_username, post.id)))
        }
        EditOutcome::Denied => {
            POST_EDITS_TOTAL.with_label_values(&["denied"]).inc();
            Ok(redirect("/"))
        }
    }
}

/// Add a comment and return to the post page
pub async fn add_comment(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(String, i64)>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse> {
    let (username, post_id) = path.into_inner();
    let (post, _) = state
        .comments()
        .create_comment(&username, post_id, &user.0, form.into_inner())
        .await
        .map_err(|e| count_rejection("comment", e))?;

    COMMENTS_CREATED_TOTAL.inc();
    Ok(redirect(&post_url(&post.author_username, post.id)))
}
