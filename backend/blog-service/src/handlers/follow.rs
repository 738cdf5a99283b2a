/// Follow handlers - every outcome lands back on the author's profile
use actix_web::{web, HttpResponse};

use super::{profile_url, redirect, AppState};
use crate::error::Result;
use crate::metrics::FOLLOW_EVENTS_TOTAL;
use crate::middleware::AuthUser;
use crate::services::{FollowOutcome, UnfollowOutcome};

pub async fn profile_follow(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let author = state.feed().find_author(&path.into_inner()).await?;

    let outcome = state.follows().follow(&user.0, &author).await?;
    let label = match outcome {
        FollowOutcome::Followed => "followed",
        FollowOutcome::AlreadyFollowing => "already_following",
        FollowOutcome::SelfFollow => "self_follow",
    };
    FOLLOW_EVENTS_TOTAL.with_label_values(&[label]).inc();

    Ok(redirect(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let author = state.feed().find_author(&path.into_inner()).await?;

    let outcome = state.follows().unfollow(&user.0, &author).await?;
    let label = match outcome {
        UnfollowOutcome::Unfollowed => "unfollowed",
        UnfollowOutcome::NotFollowing => "not_following",
    };
    FOLLOW_EVENTS_TOTAL.with_label_values(&[label]).inc();

    Ok(redirect(&profile_url(&author.username)))
}
