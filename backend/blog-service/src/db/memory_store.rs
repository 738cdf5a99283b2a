use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BlogStore, SLUG_TAKEN, USERNAME_TAKEN};
use crate::error::{AppError, Result, REQUIRED_FIELD};
use crate::models::{
    Comment, Group, ImageChange, NewComment, NewGroup, NewPost, Post, PostChanges, PostFilter,
    User,
};
use crate::services::posts::INVALID_GROUP;

#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    text: String,
    pub_date: chrono::DateTime<Utc>,
    author_id: Uuid,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: Uuid,
    text: String,
    created: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Uuid, String>,
    groups: BTreeMap<i64, Group>,
    posts: BTreeMap<i64, PostRow>,
    comments: BTreeMap<i64, CommentRow>,
    follows: BTreeSet<(Uuid, Uuid)>,
    next_group_id: i64,
    next_post_id: i64,
    next_comment_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn matches(&self, row: &PostRow, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => row.group_id == Some(group_id),
            PostFilter::Author(author_id) => row.author_id == author_id,
            PostFilter::FollowedBy(user_id) => self.follows.contains(&(user_id, row.author_id)),
        }
    }

    fn view(&self, row: &PostRow) -> Post {
        let group = row.group_id.and_then(|id| self.groups.get(&id));
        Post {
            id: row.id,
            text: row.text.clone(),
            pub_date: row.pub_date,
            author_id: row.author_id,
            author_username: self.users.get(&row.author_id).cloned().unwrap_or_default(),
            group_id: row.group_id,
            group_slug: group.map(|g| g.slug.clone()),
            group_title: group.map(|g| g.title.clone()),
            image: row.image.clone(),
            image_url: None,
        }
    }

    fn comment_view(&self, row: &CommentRow) -> Comment {
        Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            author_username: self.users.get(&row.author_id).cloned().unwrap_or_default(),
            text: row.text.clone(),
            created: row.created,
        }
    }

    fn check_group(&self, group_id: Option<i64>) -> Result<()> {
        match group_id {
            Some(id) if !self.groups.contains_key(&id) => {
                Err(AppError::invalid_field("group", INVALID_GROUP))
            }
            _ => Ok(()),
        }
    }

    fn remove_post(&mut self, post_id: i64) -> bool {
        let removed = self.posts.remove(&post_id).is_some();
        if removed {
            self.comments.retain(|_, c| c.post_id != post_id);
        }
        removed
    }
}

/// In-process blog store
///
/// Every operation takes the single table lock, so check-then-write
/// sequences are atomic just like the single-statement SQL versions.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlogStore for MemoryStore {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .users
            .iter()
            .any(|(id, name)| *id != user.id && *name == user.username);
        if taken {
            return Err(AppError::invalid_field("username", USERNAME_TAKEN));
        }
        tables.users.insert(user.id, user.username.clone());
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, name)| name.as_str() == username)
            .map(|(id, name)| User {
                id: *id,
                username: name.clone(),
            }))
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        let authored: Vec<i64> = tables
            .posts
            .values()
            .filter(|p| p.author_id == user_id)
            .map(|p| p.id)
            .collect();
        for post_id in authored {
            tables.remove_post(post_id);
        }
        tables.comments.retain(|_, c| c.author_id != user_id);
        tables
            .follows
            .retain(|(user, author)| *user != user_id && *author != user_id);
        Ok(true)
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let mut tables = self.tables.write().await;
        if tables.groups.values().any(|g| g.slug == group.slug) {
            return Err(AppError::invalid_field("slug", SLUG_TAKEN));
        }

        let id = Tables::next_id(&mut tables.next_group_id);
        let created = Group {
            id,
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.values().find(|g| g.slug == slug).cloned())
    }

    async fn find_group_by_id(&self, group_id: i64) -> Result<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.get(&group_id).cloned())
    }

    async fn delete_group(&self, group_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.groups.remove(&group_id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.group_id == Some(group_id) {
                post.group_id = None;
            }
        }
        Ok(true)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        if post.text.trim().is_empty() {
            return Err(AppError::invalid_field("text", REQUIRED_FIELD));
        }

        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&post.author_id) {
            return Err(AppError::NotFound("author".to_string()));
        }
        tables.check_group(post.group_id)?;

        let id = Tables::next_id(&mut tables.next_post_id);
        let row = PostRow {
            id,
            text: post.text.clone(),
            pub_date: Utc::now(),
            author_id: post.author_id,
            group_id: post.group_id,
            image: post.image.clone(),
        };
        let created = tables.view(&row);
        tables.posts.insert(id, row);
        Ok(created)
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&post_id).map(|row| tables.view(row)))
    }

    async fn find_post(&self, author_username: &str, post_id: i64) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .get(&post_id)
            .filter(|row| {
                tables
                    .users
                    .get(&row.author_id)
                    .is_some_and(|name| name == author_username)
            })
            .map(|row| tables.view(row)))
    }

    async fn update_post(
        &self,
        post_id: i64,
        author_id: Uuid,
        changes: &PostChanges,
    ) -> Result<bool> {
        if changes.text.trim().is_empty() {
            return Err(AppError::invalid_field("text", REQUIRED_FIELD));
        }

        let mut tables = self.tables.write().await;
        let owned = tables
            .posts
            .get(&post_id)
            .is_some_and(|row| row.author_id == author_id);
        if !owned {
            return Ok(false);
        }
        tables.check_group(changes.group_id)?;

        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(false);
        };
        row.text = changes.text.clone();
        row.group_id = changes.group_id;
        match &changes.image {
            ImageChange::Keep => {}
            ImageChange::Replace(key) => row.image = Some(key.clone()),
            ImageChange::Clear => row.image = None,
        }
        Ok(true)
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_post(post_id))
    }

    async fn list_posts(&self, filter: PostFilter, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&PostRow> = tables
            .posts
            .values()
            .filter(|row| tables.matches(row, filter))
            .collect();
        rows.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));

        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|row| tables.view(row))
            .collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .posts
            .values()
            .filter(|row| tables.matches(row, filter))
            .count();
        Ok(count as i64)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        if comment.text.trim().is_empty() {
            return Err(AppError::invalid_field("text", REQUIRED_FIELD));
        }

        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(AppError::NotFound("post".to_string()));
        }
        if !tables.users.contains_key(&comment.author_id) {
            return Err(AppError::NotFound("author".to_string()));
        }

        let id = Tables::next_id(&mut tables.next_comment_id);
        let row = CommentRow {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text.clone(),
            created: Utc::now(),
        };
        let created = tables.comment_view(&row);
        tables.comments.insert(id, row);
        Ok(created)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&CommentRow> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .collect();
        rows.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(rows.into_iter().map(|c| tables.comment_view(c)).collect())
    }

    async fn count_comments(&self, post_id: i64) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .count() as i64)
    }

    async fn create_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) || !tables.users.contains_key(&author_id) {
            return Err(AppError::NotFound("user".to_string()));
        }
        Ok(tables.follows.insert((user_id, author_id)))
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.follows.remove(&(user_id, author_id)))
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.follows.contains(&(user_id, author_id)))
    }

    async fn count_followers(&self, author_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|(_, author)| *author == author_id)
            .count() as i64)
    }

    async fn count_following(&self, user_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|(user, _)| *user == user_id)
            .count() as i64)
    }
}
