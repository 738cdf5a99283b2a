/// Feed service - assembles the paginated post listings and the post page
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::pagination::{Page, Paginator};
use crate::db::BlogStore;
use crate::error::{AppError, Result};
use crate::media::MediaStore;
use crate::models::{Comment, Group, Post, PostFilter, User};

pub const INDEX_PAGE_SIZE: i64 = 10;
pub const GROUP_PAGE_SIZE: i64 = 2;
/// A group page only ever shows its most recent posts
pub const GROUP_POST_CAP: i64 = 12;
pub const PROFILE_PAGE_SIZE: i64 = 5;
pub const FOLLOW_PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    pub page: Page<Post>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileFeed {
    pub author: User,
    pub page: Page<Post>,
    /// Whether the viewer follows this author
    pub following: bool,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub author: User,
    pub comments: Vec<Comment>,
    pub comments_count: i64,
    pub posts_count: i64,
}

pub struct FeedService {
    store: Arc<dyn BlogStore>,
    media: Arc<dyn MediaStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn BlogStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { store, media }
    }

    /// All posts, newest first
    pub async fn global(&self, page: Option<&str>) -> Result<Page<Post>> {
        self.paginate(PostFilter::All, Paginator::new(INDEX_PAGE_SIZE), page)
            .await
    }

    /// The most recent posts of one group
    pub async fn group(&self, slug: &str, page: Option<&str>) -> Result<GroupFeed> {
        let group = self
            .store
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("group".to_string()))?;

        let page = self
            .paginate(
                PostFilter::Group(group.id),
                Paginator::capped(GROUP_PAGE_SIZE, GROUP_POST_CAP),
                page,
            )
            .await?;

        Ok(GroupFeed { group, page })
    }

    /// One author's posts plus the follow state the profile header shows
    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: Option<&str>,
    ) -> Result<ProfileFeed> {
        let author = self.find_author(username).await?;

        let page = self
            .paginate(
                PostFilter::Author(author.id),
                Paginator::new(PROFILE_PAGE_SIZE),
                page,
            )
            .await?;

        let following = match viewer {
            Some(viewer_id) if viewer_id != author.id => {
                self.store.is_following(viewer_id, author.id).await?
            }
            _ => false,
        };

        Ok(ProfileFeed {
            followers_count: self.store.count_followers(author.id).await?,
            following_count: self.store.count_following(author.id).await?,
            posts_count: page.count,
            author,
            page,
            following,
        })
    }

    /// Posts by every author `user_id` follows
    pub async fn follow_feed(&self, user_id: Uuid, page: Option<&str>) -> Result<Page<Post>> {
        self.paginate(
            PostFilter::FollowedBy(user_id),
            Paginator::new(FOLLOW_PAGE_SIZE),
            page,
        )
        .await
    }

    /// A single post with its comments, oldest first
    pub async fn post_detail(&self, username: &str, post_id: i64) -> Result<PostDetail> {
        let post = self
            .store
            .find_post(username, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("post".to_string()))?;

        let author = User {
            id: post.author_id,
            username: post.author_username.clone(),
        };
        let comments = self.store.list_comments(post.id).await?;
        let posts_count = self.store.count_posts(PostFilter::Author(author.id)).await?;

        Ok(PostDetail {
            post: self.with_image_url(post),
            author,
            comments_count: comments.len() as i64,
            comments,
            posts_count,
        })
    }

    pub async fn find_author(&self, username: &str) -> Result<User> {
        self.store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))
    }

    async fn paginate(
        &self,
        filter: PostFilter,
        paginator: Paginator,
        page: Option<&str>,
    ) -> Result<Page<Post>> {
        let total = self.store.count_posts(filter).await?;
        let window = paginator.window(page, total);

        let posts = if window.limit > 0 {
            self.store
                .list_posts(filter, window.offset, window.limit)
                .await?
        } else {
            Vec::new()
        };

        tracing::debug!(
            ?filter,
            page = window.number,
            num_pages = window.num_pages,
            returned = posts.len(),
            "Assembled feed page"
        );

        Ok(Page::new(posts, window).map(|post| self.with_image_url(post)))
    }

    fn with_image_url(&self, mut post: Post) -> Post {
        post.image_url = post.image.as_deref().map(|key| self.media.url(key));
        post
    }
}
