/// Comment service - validates and persists replies to posts
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::db::BlogStore;
use crate::error::{AppError, FieldErrors, Result};
use crate::models::{Comment, NewComment, Post, User};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

pub struct CommentService {
    store: Arc<dyn BlogStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn BlogStore>) -> Self {
        Self { store }
    }

    /// Add a comment by `author` to post `post_id` of `username`
    ///
    /// Returns the commented post alongside the new comment so callers can
    /// redirect back to it.
    pub async fn create_comment(
        &self,
        username: &str,
        post_id: i64,
        author: &User,
        mut form: CommentForm,
    ) -> Result<(Post, Comment)> {
        let post = self
            .store
            .find_post(username, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("post".to_string()))?;

        form.text = form.text.trim().to_string();
        if let Err(e) = form.validate() {
            return Err(AppError::Validation {
                errors: FieldErrors::from(e),
                form: serde_json::to_value(&form)?,
            });
        }

        self.store.upsert_user(author).await?;
        let comment = self
            .store
            .create_comment(&NewComment {
                post_id: post.id,
                author_id: author.id,
                text: form.text,
            })
            .await?;

        info!(
            comment_id = comment.id,
            post_id = post.id,
            author = %author.username,
            "Comment created"
        );
        Ok((post, comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewPost;
    use uuid::Uuid;

    async fn setup() -> (Arc<dyn BlogStore>, Post, User) {
        let store: Arc<dyn BlogStore> = Arc::new(MemoryStore::new());
        let writer = User {
            id: Uuid::new_v4(),
            username: "writer".to_string(),
        };
        store.upsert_user(&writer).await.unwrap();
        let post = store
            .create_post(&NewPost {
                author_id: writer.id,
                text: "first post".to_string(),
                group_id: None,
                image: None,
            })
            .await
            .unwrap();
        let reader = User {
            id: Uuid::new_v4(),
            username: "reader".to_string(),
        };
        (store, post, reader)
    }

    #[tokio::test]
    async fn test_blank_comment_is_rejected() {
        let (store, post, reader) = setup().await;
        let service = CommentService::new(store.clone());

        let err = service
            .create_comment(
                "writer",
                post.id,
                &reader,
                CommentForm {
                    text: "  ".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains("text"));
        assert_eq!(store.count_comments(post.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_comment_on_wrong_author_path_is_not_found() {
        let (store, post, reader) = setup().await;
        let service = CommentService::new(store);

        let err = service
            .create_comment(
                "reader",
                post.id,
                &reader,
                CommentForm {
                    text: "hi".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first() {
        let (store, post, reader) = setup().await;
        let service = CommentService::new(store.clone());

        for text in ["first", "second"] {
            service
                .create_comment(
                    "writer",
                    post.id,
                    &reader,
                    CommentForm {
                        text: text.to_string(),
                    },
                )
                .await
                .unwrap();
        }

        let comments = store.list_comments(post.id).await.unwrap();
        let texts: Vec<_> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(comments[0].author_username, "reader");
    }
}
