/// Data models for blog-service
///
/// - User: identity mirrored from the session collaborator
/// - Group: community a post can be filed under
/// - Post: a published text with optional group and image
/// - Comment: reply to a post
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author's username and its group's slug/title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: Uuid,
    pub author_username: String,
    pub group_id: Option<i64>,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
    /// Storage key of the attached image
    pub image: Option<String>,
    /// Public URL of the attached image, filled in by the feed layer
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// What an edit does to the attached image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Replace(String),
    Clear,
}

#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
}

/// Which posts a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(Uuid),
    /// Posts by every author the given user follows
    FollowedBy(Uuid),
}
