/// Blog Service Library
///
/// A social blogging service: users publish text posts (optionally with an
/// image and a group), comment on posts, and follow authors to get a
/// personal feed. Handlers return JSON render contexts for an external
/// templating layer.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers and the route table
/// - `models`: Users, groups, posts, comments, follows
/// - `services`: Feeds, pagination, follows, post and comment submission
/// - `db`: `BlogStore` with PostgreSQL and in-memory implementations
/// - `media`: Image verification and media storage (local, S3)
/// - `middleware`: Session identity and request metrics
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod media;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::AppState;
