/// Business logic layer for blog-service
///
/// Services sit between the handlers and the `BlogStore`:
/// - FeedService: paginated listings and the post page
/// - FollowService: follow / unfollow
/// - PostService: post creation and editing
/// - CommentService: comments on posts
pub mod comments;
pub mod feed;
pub mod follow;
pub mod pagination;
pub mod posts;

pub use comments::{CommentForm, CommentService};
pub use feed::FeedService;
pub use follow::{FollowOutcome, FollowService, UnfollowOutcome};
pub use pagination::{Page, Paginator};
pub use posts::{EditOutcome, ImageUpload, PostForm, PostService};
