#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header;
use actix_web::{test, web, App};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use blog_service::db::{BlogStore, MemoryStore};
use blog_service::handlers::{self, AppState};
use blog_service::media::{LocalMediaStore, MediaStore};
use blog_service::middleware::{issue_token, MetricsMiddleware, SessionMiddleware, SessionSettings};
use blog_service::models::{Group, NewGroup, NewPost, Post, User};
use page_cache::{MemoryPageCache, PageCache};

pub const SECRET: &str = "integration-test-secret";
pub const LOGIN_URL: &str = "/auth/login/";
pub const PAGE_TTL: Duration = Duration::from_secs(20);

/// Memory-backed application state plus handles for assertions
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<MemoryPageCache>,
    pub state: AppState,
    pub session: SessionSettings,
    _media_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryPageCache::new());
        let media_dir = tempfile::tempdir().expect("media dir");
        let media: Arc<dyn MediaStore> =
            Arc::new(LocalMediaStore::new(media_dir.path(), "/media/"));

        let state = AppState::new(
            store.clone() as Arc<dyn BlogStore>,
            cache.clone() as Arc<dyn PageCache>,
            media,
            PAGE_TTL,
        );

        Self {
            store,
            cache,
            state,
            session: SessionSettings {
                secret: SECRET.to_string(),
                cookie_name: "sessionid".to_string(),
                login_url: LOGIN_URL.to_string(),
            },
            _media_dir: media_dir,
        }
    }

    pub async fn user(&self, username: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
        };
        self.store.upsert_user(&user).await.expect("upsert user");
        user
    }

    pub async fn group(&self, slug: &str) -> Group {
        self.store
            .create_group(&NewGroup {
                title: format!("Group {}", slug),
                slug: slug.to_string(),
                description: format!("All about {}", slug),
            })
            .await
            .expect("create group")
    }

    pub async fn post(&self, author: &User, text: &str, group_id: Option<i64>) -> Post {
        self.store
            .create_post(&NewPost {
                author_id: author.id,
                text: text.to_string(),
                group_id,
                image: None,
            })
            .await
            .expect("create post")
    }
}

pub async fn init_app(
    ctx: &TestContext,
) -> impl Service<actix_http::Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
{
    test::init_service(
        App::new()
            .app_data(web::Data::new(ctx.state.clone()))
            .app_data(web::Data::new(ctx.session.clone()))
            .wrap(SessionMiddleware::new(ctx.session.clone()))
            .wrap(MetricsMiddleware)
            .configure(handlers::configure),
    )
    .await
}

/// `Authorization` header carrying a session for `user`
pub fn auth(user: &User) -> (header::HeaderName, String) {
    let token = issue_token(SECRET, user, 3600).expect("issue token");
    (header::AUTHORIZATION, format!("Bearer {}", token))
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub enum Part {
    Text(String),
    File {
        filename: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

pub fn text(value: &str) -> Part {
    Part::Text(value.to_string())
}

pub fn file(filename: &str, content_type: &str, bytes: Vec<u8>) -> Part {
    Part::File {
        filename: filename.to_string(),
        content_type: content_type.to_string(),
        bytes,
    }
}

/// Encode `parts` as multipart/form-data, returning (content type, body)
pub fn multipart(parts: Vec<(&str, Part)>) -> (String, Vec<u8>) {
    let boundary = "----blog-test-boundary";
    let mut body = Vec::new();

    for (name, part) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match part {
            Part::Text(value) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                        name, value
                    )
                    .as_bytes(),
                );
            }
            Part::File {
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

/// A small but real JPEG
pub fn jpeg_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Jpeg(85))
        .expect("encode jpeg");
    out.into_inner()
}
