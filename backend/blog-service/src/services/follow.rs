/// Follow service - manages `user -> author` follow edges
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::BlogStore;
use crate::error::Result;
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    /// Following yourself never creates an edge
    SelfFollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    NotFollowing,
}

pub struct FollowService {
    store: Arc<dyn BlogStore>,
}

impl FollowService {
    pub fn new(store: Arc<dyn BlogStore>) -> Self {
        Self { store }
    }

    /// Follow `target` unless already following or following yourself
    pub async fn follow(&self, current: &User, target: &User) -> Result<FollowOutcome> {
        if current.id == target.id {
            debug!(user_id = %current.id, "Ignoring self-follow");
            return Ok(FollowOutcome::SelfFollow);
        }

        // ensure the follower row exists before the edge references it
        self.store.upsert_user(current).await?;

        if self.store.is_following(current.id, target.id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        // the insert is conflict-free, so a concurrent follow just loses
        if self.store.create_follow(current.id, target.id).await? {
            info!(follower = %current.id, followee = %target.id, "User followed");
            Ok(FollowOutcome::Followed)
        } else {
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    /// Remove the edge if present
    pub async fn unfollow(&self, current: &User, target: &User) -> Result<UnfollowOutcome> {
        if self.store.delete_follow(current.id, target.id).await? {
            info!(follower = %current.id, followee = %target.id, "User unfollowed");
            Ok(UnfollowOutcome::Unfollowed)
        } else {
            Ok(UnfollowOutcome::NotFollowing)
        }
    }

    /// False without a caller or when the caller is the target
    pub async fn is_following(&self, current: Option<&User>, target: &User) -> Result<bool> {
        match current {
            Some(user) if user.id != target.id => {
                self.store.is_following(user.id, target.id).await
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use uuid::Uuid;

    async fn setup() -> (Arc<dyn BlogStore>, User, User) {
        let store: Arc<dyn BlogStore> = Arc::new(MemoryStore::new());
        let reader = User {
            id: Uuid::new_v4(),
            username: "reader".to_string(),
        };
        let writer = User {
            id: Uuid::new_v4(),
            username: "writer".to_string(),
        };
        store.upsert_user(&reader).await.unwrap();
        store.upsert_user(&writer).await.unwrap();
        (store, reader, writer)
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let (store, reader, writer) = setup().await;
        let service = FollowService::new(store.clone());

        assert_eq!(
            service.follow(&reader, &writer).await.unwrap(),
            FollowOutcome::Followed
        );
        assert_eq!(
            service.follow(&reader, &writer).await.unwrap(),
            FollowOutcome::AlreadyFollowing
        );
        assert_eq!(store.count_followers(writer.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_self_follow_creates_no_edge() {
        let (store, reader, _) = setup().await;
        let service = FollowService::new(store.clone());

        assert_eq!(
            service.follow(&reader, &reader).await.unwrap(),
            FollowOutcome::SelfFollow
        );
        assert_eq!(store.count_following(reader.id).await.unwrap(), 0);
        assert!(!service.is_following(Some(&reader), &reader).await.unwrap());
    }

    #[tokio::test]
    async fn test_unfollow_missing_edge_is_noop() {
        let (store, reader, writer) = setup().await;
        let service = FollowService::new(store);

        assert_eq!(
            service.unfollow(&reader, &writer).await.unwrap(),
            UnfollowOutcome::NotFollowing
        );
        service.follow(&reader, &writer).await.unwrap();
        assert!(service.is_following(Some(&reader), &writer).await.unwrap());
        assert_eq!(
            service.unfollow(&reader, &writer).await.unwrap(),
            UnfollowOutcome::Unfollowed
        );
        assert!(!service.is_following(Some(&reader), &writer).await.unwrap());
        assert!(!service.is_following(None, &writer).await.unwrap());
    }
}
