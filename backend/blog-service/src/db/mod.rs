/// Database access layer
///
/// `BlogStore` is the seam every service talks to. Reverse relations
/// (a group's posts, a user's follows) are explicit filtered queries rather
/// than back-references on the entities.
///
/// - `PgStore`: PostgreSQL, the source of truth in deployments
/// - `MemoryStore`: in-process tables with the same invariants
pub mod memory_store;
pub mod pg_store;
pub mod pool;

pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
pub use pool::{create_pool, run_migrations, DbConfig};

use crate::error::Result;
use crate::models::{
    Comment, Group, NewComment, NewGroup, NewPost, Post, PostChanges, PostFilter, User,
};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait BlogStore: Send + Sync {
    // ============= Users =============

    /// Insert or rename a user mirrored from the identity collaborator
    async fn upsert_user(&self, user: &User) -> Result<()>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Delete a user with their posts, comments and follow edges
    async fn delete_user(&self, user_id: Uuid) -> Result<bool>;

    // ============= Groups =============

    /// Fails with a validation error on `slug` when the slug is taken
    async fn create_group(&self, group: &NewGroup) -> Result<Group>;

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    async fn find_group_by_id(&self, group_id: i64) -> Result<Option<Group>>;

    /// Delete a group; its posts stay and lose their group
    async fn delete_group(&self, group_id: i64) -> Result<bool>;

    // ============= Posts =============

    async fn create_post(&self, post: &NewPost) -> Result<Post>;

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>>;

    /// Post `post_id` written by `author_username`
    async fn find_post(&self, author_username: &str, post_id: i64) -> Result<Option<Post>>;

    /// Apply `changes` if `author_id` wrote the post; false otherwise
    async fn update_post(
        &self,
        post_id: i64,
        author_id: Uuid,
        changes: &PostChanges,
    ) -> Result<bool>;

    /// Delete a post and its comments
    async fn delete_post(&self, post_id: i64) -> Result<bool>;

    /// Posts matching `filter`, newest first
    async fn list_posts(&self, filter: PostFilter, offset: i64, limit: i64) -> Result<Vec<Post>>;

    async fn count_posts(&self, filter: PostFilter) -> Result<i64>;

    // ============= Comments =============

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment>;

    /// Comments of a post, oldest first
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>>;

    async fn count_comments(&self, post_id: i64) -> Result<i64>;

    // ============= Follows =============

    /// Insert the edge unless present; true if a new edge was written
    async fn create_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool>;

    /// Remove the edge; true if one existed
    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool>;

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool>;

    /// How many users follow `author_id`
    async fn count_followers(&self, author_id: Uuid) -> Result<i64>;

    /// How many authors `user_id` follows
    async fn count_following(&self, user_id: Uuid) -> Result<i64>;

    /// Health check (optional)
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Message used when a group slug is already taken
pub const SLUG_TAKEN: &str = "Group with this Slug already exists.";

/// Message used when a username belongs to another account
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
