// Toggle engine - idempotent create-or-delete semantics for the
// uniqueness-constrained Like and Follow relations.
//
// Each toggle re-reads current relation state; nothing is cached across
// requests. A relation cycles {absent, present} indefinitely: create on
// the first toggle, delete on the next, a fresh row (new timestamp) on
// the one after that. Fanout fires only on the create branch.

use std::sync::Arc;
use tracing::info;

use crate::database::SocialDatabase;
use crate::error::{AppError, AppResult};
use crate::fanout;
use crate::models::{NotificationKind, NotificationTarget, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToggle {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowToggle {
    Followed,
    Unfollowed,
}

#[derive(Clone)]
pub struct ToggleEngine {
    db: Arc<SocialDatabase>,
}

impl ToggleEngine {
    pub fn new(db: Arc<SocialDatabase>) -> Self {
        Self { db }
    }

    pub async fn toggle_like(&self, actor: &User, post_id: i64) -> AppResult<LikeToggle> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post with id {} not found", post_id)))?;

        if self.db.like_exists(actor.id, post.id).await? {
            self.db.delete_like(actor.id, post.id).await?;
            info!("User {} unliked post {}", actor.id, post.id);
            return Ok(LikeToggle::Unliked);
        }

        match self.db.insert_like(actor.id, post.id).await? {
            Some(_) => {
                info!("User {} liked post {}", actor.id, post.id);
                fanout::on_action_created(
                    &self.db,
                    NotificationKind::Like,
                    actor.id,
                    post.author_id,
                    NotificationTarget::Post { post_id: post.id },
                )
                .await;
                Ok(LikeToggle::Liked)
            }
            // Lost a race with a concurrent toggle: the unique constraint
            // says the row exists now, so take the delete branch.
            None => {
                self.db.delete_like(actor.id, post.id).await?;
                Ok(LikeToggle::Unliked)
            }
        }
    }

    pub async fn toggle_follow(&self, actor: &User, target_user_id: i64) -> AppResult<FollowToggle> {
        // Checked before touching the store
        if actor.id == target_user_id {
            return Err(AppError::Validation("You cannot follow yourself.".to_string()));
        }

        let target = self
            .db
            .get_user(target_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", target_user_id)))?;

        if self.db.follow_exists(actor.id, target.id).await? {
            self.db.delete_follow(actor.id, target.id).await?;
            info!("User {} unfollowed user {}", actor.id, target.id);
            return Ok(FollowToggle::Unfollowed);
        }

        match self.db.insert_follow(actor.id, target.id).await? {
            Some(_) => {
                info!("User {} followed user {}", actor.id, target.id);
                fanout::on_action_created(
                    &self.db,
                    NotificationKind::Follow,
                    actor.id,
                    target.id,
                    NotificationTarget::None,
                )
                .await;
                Ok(FollowToggle::Followed)
            }
            None => {
                self.db.delete_follow(actor.id, target.id).await?;
                Ok(FollowToggle::Unfollowed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_db;
    use crate::models::User;

    async fn setup() -> (ToggleEngine, Arc<SocialDatabase>, User, User) {
        let db = Arc::new(memory_db().await);
        let alice = db.create_user("alice", "alice@example.com", None).await.unwrap().unwrap();
        let bob = db.create_user("bob", "bob@example.com", None).await.unwrap().unwrap();
        (ToggleEngine::new(db.clone()), db, alice, bob)
    }

    #[tokio::test]
    async fn like_toggle_flips_between_liked_and_unliked() {
        let (engine, db, alice, bob) = setup().await;
        let post = db.create_post(bob.id, "hello").await.unwrap();

        // Odd number of toggles -> exactly one row, even -> zero
        assert_eq!(engine.toggle_like(&alice, post.id).await.unwrap(), LikeToggle::Liked);
        assert_eq!(db.count_likes(alice.id, post.id).await.unwrap(), 1);

        assert_eq!(engine.toggle_like(&alice, post.id).await.unwrap(), LikeToggle::Unliked);
        assert_eq!(db.count_likes(alice.id, post.id).await.unwrap(), 0);

        assert_eq!(engine.toggle_like(&alice, post.id).await.unwrap(), LikeToggle::Liked);
        assert_eq!(db.count_likes(alice.id, post.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn like_notifies_the_post_author_once() {
        let (engine, db, alice, bob) = setup().await;
        let post = db.create_post(bob.id, "hello").await.unwrap();

        engine.toggle_like(&alice, post.id).await.unwrap();
        let notifications = db.notifications_for(bob.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].sender_id, alice.id);
        assert_eq!(notifications[0].kind, NotificationKind::Like);
        assert_eq!(notifications[0].target, NotificationTarget::Post { post_id: post.id });

        // Unlike produces no notification, and the original one stays
        engine.toggle_like(&alice, post.id).await.unwrap();
        assert_eq!(db.count_notifications(bob.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn liking_your_own_post_produces_no_notification() {
        let (engine, db, _alice, bob) = setup().await;
        let post = db.create_post(bob.id, "hello").await.unwrap();

        engine.toggle_like(&bob, post.id).await.unwrap();

        assert_eq!(db.count_likes(bob.id, post.id).await.unwrap(), 1);
        assert_eq!(db.count_notifications(bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn like_on_missing_post_is_not_found() {
        let (engine, _db, alice, _bob) = setup().await;

        match engine.toggle_like(&alice, 9999).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn follow_toggle_flips_and_notifies_on_create_only() {
        let (engine, db, alice, bob) = setup().await;

        assert_eq!(engine.toggle_follow(&alice, bob.id).await.unwrap(), FollowToggle::Followed);
        assert!(db.follow_exists(alice.id, bob.id).await.unwrap());
        assert_eq!(db.count_notifications(bob.id).await.unwrap(), 1);
        let notifications = db.notifications_for(bob.id).await.unwrap();
        assert_eq!(notifications[0].kind, NotificationKind::Follow);
        assert_eq!(notifications[0].target, NotificationTarget::None);

        assert_eq!(engine.toggle_follow(&alice, bob.id).await.unwrap(), FollowToggle::Unfollowed);
        assert!(!db.follow_exists(alice.id, bob.id).await.unwrap());
        assert_eq!(db.count_notifications(bob.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn self_follow_is_rejected_before_touching_the_store() {
        let (engine, db, alice, _bob) = setup().await;

        // Rejected regardless of prior state, repeatedly
        for _ in 0..2 {
            match engine.toggle_follow(&alice, alice.id).await {
                Err(AppError::Validation(msg)) => assert!(msg.contains("yourself")),
                other => panic!("expected Validation, got {:?}", other.map(|_| ())),
            }
        }

        assert!(!db.follow_exists(alice.id, alice.id).await.unwrap());
        assert_eq!(db.count_notifications(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn follow_on_missing_user_is_not_found() {
        let (engine, _db, alice, _bob) = setup().await;

        match engine.toggle_follow(&alice, 9999).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }
}
