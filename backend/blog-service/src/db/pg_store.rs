use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

use super::{BlogStore, SLUG_TAKEN, USERNAME_TAKEN};
use crate::error::{AppError, Result};
use crate::models::{
    Comment, Group, ImageChange, NewComment, NewGroup, NewPost, Post, PostChanges, PostFilter,
    User,
};

/// Columns of `Post`, selected from `posts p` joined with `users u` and
/// `post_groups g`.
const POST_COLUMNS: &str = r#"
    p.id, p.text, p.pub_date, p.author_id, u.username AS author_username,
    p.group_id, g.slug AS group_slug, g.title AS group_title, p.image
"#;

const POST_JOINS: &str = r#"
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

/// PostgreSQL blog store (source of truth)
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
        match filter {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                builder.push(" WHERE p.group_id = ").push_bind(group_id);
            }
            PostFilter::Author(author_id) => {
                builder.push(" WHERE p.author_id = ").push_bind(author_id);
            }
            PostFilter::FollowedBy(user_id) => {
                builder
                    .push(" WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[async_trait::async_trait]
impl BlogStore for PgStore {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::invalid_field("username", USERNAME_TAKEN)
            } else {
                AppError::from(e)
            }
        })?;

        debug!(user_id = %user.id, username = %user.username, "Upserted user");
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO post_groups (title, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, title, slug, description
            "#,
        )
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::invalid_field("slug", SLUG_TAKEN)
            } else {
                AppError::from(e)
            }
        })
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, title, slug, description FROM post_groups WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn find_group_by_id(&self, group_id: i64) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, title, slug, description FROM post_groups WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn delete_group(&self, group_id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM post_groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let sql = format!(
            r#"
            WITH p AS (
                INSERT INTO posts (author_id, text, group_id, image, pub_date)
                VALUES ($1, $2, $3, $4, NOW())
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p {POST_JOINS}
            "#
        );

        let created = sqlx::query_as::<_, Post>(&sql)
            .bind(post.author_id)
            .bind(&post.text)
            .bind(post.group_id)
            .bind(&post.image)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::invalid_field("group", crate::services::posts::INVALID_GROUP)
                } else {
                    AppError::from(e)
                }
            })?;

        debug!(post_id = created.id, author_id = %created.author_id, "Inserted post");
        Ok(created)
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p {POST_JOINS} WHERE p.id = $1");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn find_post(&self, author_username: &str, post_id: i64) -> Result<Option<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p {POST_JOINS} WHERE p.id = $1 AND u.username = $2"
        );
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(post_id)
            .bind(author_username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: i64,
        author_id: Uuid,
        changes: &PostChanges,
    ) -> Result<bool> {
        let (touch_image, image) = match &changes.image {
            ImageChange::Keep => (false, None),
            ImageChange::Replace(key) => (true, Some(key.as_str())),
            ImageChange::Clear => (true, None),
        };

        // authorship is part of the WHERE clause so the check and the write
        // are one statement
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET text = $1,
                group_id = $2,
                image = CASE WHEN $3 THEN $4 ELSE image END
            WHERE id = $5 AND author_id = $6
            "#,
        )
        .bind(&changes.text)
        .bind(changes.group_id)
        .bind(touch_image)
        .bind(image)
        .bind(post_id)
        .bind(author_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::invalid_field("group", crate::services::posts::INVALID_GROUP)
            } else {
                AppError::from(e)
            }
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn list_posts(&self, filter: PostFilter, offset: i64, limit: i64) -> Result<Vec<Post>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p {POST_JOINS}"
        ));
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let posts = builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS count FROM posts p");
        Self::push_filter(&mut builder, filter);

        let row = builder.build().fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let created = sqlx::query_as::<_, Comment>(
            r#"
            WITH c AS (
                INSERT INTO comments (post_id, author_id, text, created)
                VALUES ($1, $2, $3, NOW())
                RETURNING *
            )
            SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created
            FROM c JOIN users u ON u.id = c.author_id
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("post".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        debug!(comment_id = created.id, post_id = created.post_id, "Inserted comment");
        Ok(created)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created
            FROM comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created ASC, c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn count_comments(&self, post_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn create_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let inserted = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO follows (user_id, author_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id, author_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row.is_some()),
            // a concurrent insert of the same edge already won
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2) AS following",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<bool, _>("following"))
    }

    async fn count_followers(&self, author_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM follows WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn count_following(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM follows WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
