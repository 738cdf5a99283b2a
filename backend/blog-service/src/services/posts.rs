/// Post service - validates and persists post submissions
///
/// A submission is validated completely (text, group, image) before anything
/// is written: an invalid form never uploads an image or touches a post.
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::db::BlogStore;
use crate::error::{AppError, FieldErrors, Result};
use crate::media::{verify_image, MediaError, MediaStore, VerifiedImage, INVALID_IMAGE_MESSAGE};
use crate::models::{ImageChange, NewPost, Post, PostChanges, User};

/// Message shown when `group` does not name an existing group
pub const INVALID_GROUP: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// A file part of a multipart submission
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Post submission as read from the request
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct PostForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
    /// Raw group id; empty means no group
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    #[serde(rename = "image-clear")]
    pub clear_image: bool,
}

impl PostForm {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    fn echo(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A form that passed every check
struct ValidatedPost {
    text: String,
    group_id: Option<i64>,
    image: Option<(VerifiedImage, Vec<u8>)>,
    clear_image: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Updated(Post),
    /// Editor is not the author; nothing was changed
    Denied,
}

pub struct PostService {
    store: Arc<dyn BlogStore>,
    media: Arc<dyn MediaStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn BlogStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { store, media }
    }

    /// Publish a new post by `author`
    pub async fn create_post(&self, author: &User, form: PostForm) -> Result<Post> {
        let validated = self.validate(form).await?;

        self.store.upsert_user(author).await?;
        let image = match validated.image {
            Some((verified, bytes)) => Some(self.store_image(&verified, bytes).await?),
            None => None,
        };

        let created = self
            .store
            .create_post(&NewPost {
                author_id: author.id,
                text: validated.text,
                group_id: validated.group_id,
                image: image.clone(),
            })
            .await;
        let post = match created {
            Ok(post) => post,
            Err(e) => {
                if let Some(key) = image {
                    self.discard_image(&key).await;
                }
                return Err(e);
            }
        };

        info!(
            post_id = post.id,
            author = %author.username,
            group_id = ?post.group_id,
            has_image = post.image.is_some(),
            "Post created"
        );
        Ok(post)
    }

    /// The post if `editor` is its author, `None` otherwise
    pub async fn editable_post(
        &self,
        username: &str,
        post_id: i64,
        editor: &User,
    ) -> Result<Option<Post>> {
        let post = self.find_post(username, post_id).await?;
        Ok((post.author_id == editor.id).then_some(post))
    }

    /// Apply an edit by `editor` to post `post_id` of `username`
    pub async fn edit_post(
        &self,
        username: &str,
        post_id: i64,
        editor: &User,
        form: PostForm,
    ) -> Result<EditOutcome> {
        let post = self.find_post(username, post_id).await?;
        if post.author_id != editor.id {
            warn!(post_id, editor = %editor.username, "Edit denied for non-author");
            return Ok(EditOutcome::Denied);
        }

        let validated = self.validate(form).await?;
        let image = match validated.image {
            Some((verified, bytes)) => {
                ImageChange::Replace(self.store_image(&verified, bytes).await?)
            }
            None if validated.clear_image => ImageChange::Clear,
            None => ImageChange::Keep,
        };

        let changes = PostChanges {
            text: validated.text,
            group_id: validated.group_id,
            image,
        };
        let applied = self.store.update_post(post.id, editor.id, &changes).await;
        if !matches!(applied, Ok(true)) {
            if let ImageChange::Replace(key) = &changes.image {
                self.discard_image(key).await;
            }
        }
        if !applied? {
            return Ok(EditOutcome::Denied);
        }

        let updated = self
            .store
            .get_post(post.id)
            .await?
            .ok_or_else(|| AppError::NotFound("post".to_string()))?;

        info!(post_id = updated.id, author = %editor.username, "Post edited");
        Ok(EditOutcome::Updated(updated))
    }

    async fn find_post(&self, username: &str, post_id: i64) -> Result<Post> {
        self.store
            .find_post(username, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("post".to_string()))
    }

    async fn validate(&self, mut form: PostForm) -> Result<ValidatedPost> {
        form.text = form.text.trim().to_string();

        let mut errors = match form.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => FieldErrors::from(e),
        };

        let group_id = match form.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let group = match raw.parse::<i64>() {
                    Ok(id) => self.store.find_group_by_id(id).await?,
                    Err(_) => None,
                };
                if group.is_none() {
                    errors.add("group", INVALID_GROUP);
                }
                group.map(|g| g.id)
            }
        };

        let image = match form.image.as_ref() {
            Some(upload) => match verify_image(upload.bytes.clone()).await {
                Ok(verified) => Some((verified, upload.bytes.clone())),
                Err(MediaError::InvalidImage(reason)) => {
                    debug!(filename = ?upload.filename, %reason, "Rejected upload");
                    errors.add("image", INVALID_IMAGE_MESSAGE);
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(AppError::Validation {
                errors,
                form: form.echo(),
            });
        }

        Ok(ValidatedPost {
            text: form.text,
            group_id,
            image,
            clear_image: form.clear_image,
        })
    }

    async fn store_image(&self, verified: &VerifiedImage, bytes: Vec<u8>) -> Result<String> {
        let key = verified.storage_key();
        let stored = self
            .media
            .put(&key, bytes, verified.content_type())
            .await?;
        debug!(key = %stored, format = ?verified.format, "Stored post image");
        Ok(stored)
    }

    /// Best-effort removal of an image whose post was never written
    async fn discard_image(&self, key: &str) {
        match self.media.delete(key).await {
            Ok(()) => debug!(key = %key, "Discarded unused post image"),
            Err(e) => warn!(key = %key, error = %e, "Failed to discard unused post image"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::error::REQUIRED_FIELD;
    use crate::media::{LocalMediaStore, POSTS_PREFIX};
    use crate::models::{Comment, Group, NewComment, NewGroup, PostFilter};
    use std::io::Cursor;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<dyn BlogStore>,
        service: PostService,
        author: User,
        media_dir: tempfile::TempDir,
    }

    fn setup() -> Fixture {
        setup_with(Arc::new(MemoryStore::new()))
    }

    fn setup_with(store: Arc<dyn BlogStore>) -> Fixture {
        let media_dir = tempfile::tempdir().unwrap();
        let media: Arc<dyn MediaStore> =
            Arc::new(LocalMediaStore::new(media_dir.path(), "/media/"));
        Fixture {
            service: PostService::new(store.clone(), media),
            store,
            author: User {
                id: Uuid::new_v4(),
                username: "leo".to_string(),
            },
            media_dir,
        }
    }

    impl Fixture {
        /// Image files currently under the media root
        fn stored_images(&self) -> usize {
            std::fs::read_dir(self.media_dir.path().join(POSTS_PREFIX))
                .map(|dir| dir.count())
                .unwrap_or(0)
        }

        async fn group(&self, slug: &str) -> Group {
            self.store
                .create_group(&NewGroup {
                    title: slug.to_string(),
                    slug: slug.to_string(),
                    description: String::new(),
                })
                .await
                .unwrap()
        }
    }

    /// Memory store whose post writes always fail
    struct FailingWrites(MemoryStore);

    #[async_trait::async_trait]
    impl BlogStore for FailingWrites {
        async fn upsert_user(&self, user: &User) -> Result<()> {
            self.0.upsert_user(user).await
        }
        async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
            self.0.find_user_by_username(username).await
        }
        async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
            self.0.delete_user(user_id).await
        }
        async fn create_group(&self, group: &NewGroup) -> Result<Group> {
            self.0.create_group(group).await
        }
        async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
            self.0.find_group_by_slug(slug).await
        }
        async fn find_group_by_id(&self, group_id: i64) -> Result<Option<Group>> {
            self.0.find_group_by_id(group_id).await
        }
        async fn delete_group(&self, group_id: i64) -> Result<bool> {
            self.0.delete_group(group_id).await
        }
        async fn create_post(&self, _post: &NewPost) -> Result<Post> {
            Err(AppError::Database("connection reset".to_string()))
        }
        async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
            self.0.get_post(post_id).await
        }
        async fn find_post(&self, author_username: &str, post_id: i64) -> Result<Option<Post>> {
            self.0.find_post(author_username, post_id).await
        }
        async fn update_post(
            &self,
            _post_id: i64,
            _author_id: Uuid,
            _changes: &PostChanges,
        ) -> Result<bool> {
            Err(AppError::Database("connection reset".to_string()))
        }
        async fn delete_post(&self, post_id: i64) -> Result<bool> {
            self.0.delete_post(post_id).await
        }
        async fn list_posts(
            &self,
            filter: PostFilter,
            offset: i64,
            limit: i64,
        ) -> Result<Vec<Post>> {
            self.0.list_posts(filter, offset, limit).await
        }
        async fn count_posts(&self, filter: PostFilter) -> Result<i64> {
            self.0.count_posts(filter).await
        }
        async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
            self.0.create_comment(comment).await
        }
        async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
            self.0.list_comments(post_id).await
        }
        async fn count_comments(&self, post_id: i64) -> Result<i64> {
            self.0.count_comments(post_id).await
        }
        async fn create_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
            self.0.create_follow(user_id, author_id).await
        }
        async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
            self.0.delete_follow(user_id, author_id).await
        }
        async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool> {
            self.0.is_following(user_id, author_id).await
        }
        async fn count_followers(&self, author_id: Uuid) -> Result<i64> {
            self.0.count_followers(author_id).await
        }
        async fn count_following(&self, user_id: Uuid) -> Result<i64> {
            self.0.count_following(user_id).await
        }
    }

    fn jpeg_upload() -> ImageUpload {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Jpeg(90))
            .unwrap();
        ImageUpload {
            filename: Some("photo.jpg".to_string()),
            content_type: Some("image/jpeg".to_string()),
            bytes: out.into_inner(),
        }
    }

    #[tokio::test]
    async fn test_blank_text_is_required() {
        let fx = setup();
        let err = fx
            .service
            .create_post(&fx.author, PostForm::new("   "))
            .await
            .unwrap_err();

        let errors = serde_json::to_value(err.field_errors().unwrap()).unwrap();
        assert_eq!(errors["text"], serde_json::json!([REQUIRED_FIELD]));
        assert_eq!(fx.store.count_posts(PostFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_group_is_rejected() {
        let fx = setup();
        let form = PostForm {
            group: Some("42".to_string()),
            ..PostForm::new("hello")
        };

        let err = fx.service.create_post(&fx.author, form).await.unwrap_err();
        assert!(err.field_errors().unwrap().contains("group"));
    }

    #[tokio::test]
    async fn test_non_image_writes_nothing() {
        let fx = setup();
        let form = PostForm {
            image: Some(ImageUpload {
                filename: Some("notes.jpg".to_string()),
                content_type: Some("image/jpeg".to_string()),
                bytes: b"plain text pretending".to_vec(),
            }),
            ..PostForm::new("with image")
        };

        let err = fx.service.create_post(&fx.author, form).await.unwrap_err();
        assert!(err.field_errors().unwrap().contains("image"));
        assert_eq!(fx.store.count_posts(PostFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_with_group_and_image() {
        let fx = setup();
        let group = fx
            .store
            .create_group(&NewGroup {
                title: "Cats".to_string(),
                slug: "cats".to_string(),
                description: "cats only".to_string(),
            })
            .await
            .unwrap();

        let form = PostForm {
            group: Some(group.id.to_string()),
            image: Some(jpeg_upload()),
            ..PostForm::new("  a cat  ")
        };
        let post = fx.service.create_post(&fx.author, form).await.unwrap();

        assert_eq!(post.text, "a cat");
        assert_eq!(post.group_slug.as_deref(), Some("cats"));
        let key = post.image.unwrap();
        assert!(key.starts_with("posts/") && key.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_edit_by_non_author_is_denied() {
        let fx = setup();
        let cats = fx.group("cats").await;
        let dogs = fx.group("dogs").await;
        let form = PostForm {
            group: Some(cats.id.to_string()),
            image: Some(jpeg_upload()),
            ..PostForm::new("original")
        };
        let post = fx.service.create_post(&fx.author, form).await.unwrap();
        let intruder = User {
            id: Uuid::new_v4(),
            username: "ann".to_string(),
        };

        let hijack = PostForm {
            group: Some(dogs.id.to_string()),
            image: Some(jpeg_upload()),
            clear_image: true,
            ..PostForm::new("hijacked")
        };
        let outcome = fx
            .service
            .edit_post("leo", post.id, &intruder, hijack)
            .await
            .unwrap();
        assert_eq!(outcome, EditOutcome::Denied);

        let stored = fx.store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "original");
        assert_eq!(stored.group_id, Some(cats.id));
        assert_eq!(stored.image, post.image);
        assert!(stored.image.is_some());
        assert_eq!(fx.stored_images(), 1);
    }

    #[tokio::test]
    async fn test_editable_post_only_for_author() {
        let fx = setup();
        let post = fx
            .service
            .create_post(&fx.author, PostForm::new("mine"))
            .await
            .unwrap();
        let other = User {
            id: Uuid::new_v4(),
            username: "ann".to_string(),
        };

        let editable = fx.service.editable_post("leo", post.id, &fx.author).await.unwrap();
        assert_eq!(editable.map(|p| p.id), Some(post.id));
        assert_eq!(
            fx.service.editable_post("leo", post.id, &other).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_failed_insert_discards_uploaded_image() {
        let fx = setup_with(Arc::new(FailingWrites(MemoryStore::new())));
        let form = PostForm {
            image: Some(jpeg_upload()),
            ..PostForm::new("doomed")
        };

        let err = fx.service.create_post(&fx.author, form).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(fx.stored_images(), 0);
    }

    #[tokio::test]
    async fn test_failed_update_discards_replacement_image() {
        let inner = MemoryStore::new();
        let fx = setup_with(Arc::new(FailingWrites(inner.clone())));
        inner.upsert_user(&fx.author).await.unwrap();
        let post = inner
            .create_post(&NewPost {
                author_id: fx.author.id,
                text: "original".to_string(),
                group_id: None,
                image: None,
            })
            .await
            .unwrap();

        let form = PostForm {
            image: Some(jpeg_upload()),
            ..PostForm::new("edited")
        };
        let err = fx
            .service
            .edit_post("leo", post.id, &fx.author, form)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(fx.stored_images(), 0);
    }

    #[tokio::test]
    async fn test_edit_keeps_pub_date_and_clears_image() {
        let fx = setup();
        let form = PostForm {
            image: Some(jpeg_upload()),
            ..PostForm::new("original")
        };
        let post = fx.service.create_post(&fx.author, form).await.unwrap();

        let kept = fx
            .service
            .edit_post("leo", post.id, &fx.author, PostForm::new("edited"))
            .await
            .unwrap();
        let EditOutcome::Updated(kept) = kept else {
            panic!("author edit was denied");
        };
        assert_eq!(kept.text, "edited");
        assert_eq!(kept.pub_date, post.pub_date);
        assert_eq!(kept.image, post.image);

        let clear = PostForm {
            clear_image: true,
            ..PostForm::new("edited")
        };
        let EditOutcome::Updated(cleared) = fx
            .service
            .edit_post("leo", post.id, &fx.author, clear)
            .await
            .unwrap()
        else {
            panic!("author edit was denied");
        };
        assert_eq!(cleared.image, None);
    }

    #[tokio::test]
    async fn test_edit_unknown_post_is_not_found() {
        let fx = setup();
        let err = fx
            .service
            .edit_post("leo", 99, &fx.author, PostForm::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
