// Feed assembler - read-side composition of followed-author posts.
//
// Popularity is likes_count + comments_count, counted per post at query
// time. No caching and no incremental maintenance.

use std::sync::Arc;

use futures::future::join_all;

use crate::database::SocialDatabase;
use crate::error::AppResult;
use crate::models::{FeedOrdering, Post, PostView};

#[derive(Clone)]
pub struct FeedAssembler {
    db: Arc<SocialDatabase>,
}

impl FeedAssembler {
    pub fn new(db: Arc<SocialDatabase>) -> Self {
        Self { db }
    }

    /// Posts authored by users the viewer follows, under the requested
    /// ordering. Recency ties fall back to row id so rows created within
    /// the same second order deterministically.
    pub async fn assemble(&self, viewer_id: i64, ordering: FeedOrdering) -> AppResult<Vec<PostView>> {
        let candidates = self.db.feed_candidates(viewer_id).await?;
        let mut views = self.hydrate(candidates).await?;

        // Candidates arrive newest-first from the store; only popularity
        // needs a re-sort.
        if ordering == FeedOrdering::Popularity {
            views.sort_by(|a, b| {
                let pa = a.likes_count + a.comments_count;
                let pb = b.likes_count + b.comments_count;
                pb.cmp(&pa)
                    .then(b.created_at.cmp(&a.created_at))
                    .then(b.id.cmp(&a.id))
            });
        }

        Ok(views)
    }

    /// Attach query-time like/comment counts to post rows. Counts for
    /// independent posts are fetched concurrently.
    pub async fn hydrate(&self, rows: Vec<(Post, String)>) -> AppResult<Vec<PostView>> {
        let count_futures = rows.iter().map(|(post, _)| self.db.post_counts(post.id));
        let counts = join_all(count_futures).await;

        rows.into_iter()
            .zip(counts)
            .map(|((post, author_username), counts)| {
                let (likes_count, comments_count) = counts?;
                Ok(PostView {
                    id: post.id,
                    author_id: post.author_id,
                    author_username,
                    content: post.content,
                    created_at: post.created_at,
                    updated_at: post.updated_at,
                    likes_count,
                    comments_count,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_db;
    use crate::models::User;

    async fn user(db: &SocialDatabase, name: &str) -> User {
        db.create_user(name, &format!("{}@example.com", name), None)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn feed_contains_followed_authors_only() {
        let db = Arc::new(memory_db().await);
        let viewer = user(&db, "viewer").await;
        let followed = user(&db, "followed").await;
        let stranger = user(&db, "stranger").await;

        db.insert_follow(viewer.id, followed.id).await.unwrap();
        let followed_post = db.create_post(followed.id, "from followed").await.unwrap();
        db.create_post(stranger.id, "from stranger").await.unwrap();

        let feed = FeedAssembler::new(db.clone())
            .assemble(viewer.id, FeedOrdering::Recent)
            .await
            .unwrap();

        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, followed_post.id);
        assert_eq!(feed[0].author_username, "followed");
    }

    #[tokio::test]
    async fn popularity_orders_by_like_plus_comment_count() {
        let db = Arc::new(memory_db().await);
        let viewer = user(&db, "viewer").await;
        let author = user(&db, "author").await;
        db.insert_follow(viewer.id, author.id).await.unwrap();

        // Older post: 5 likes + 2 comments. Newer post: 3 likes + 1 comment.
        let popular = db.create_post(author.id, "popular").await.unwrap();
        let quieter = db.create_post(author.id, "quieter").await.unwrap();

        for i in 0..5 {
            let fan = user(&db, &format!("fan{}", i)).await;
            db.insert_like(fan.id, popular.id).await.unwrap();
            if i < 3 {
                db.insert_like(fan.id, quieter.id).await.unwrap();
            }
        }
        db.create_comment(viewer.id, popular.id, "first").await.unwrap();
        db.create_comment(viewer.id, popular.id, "second").await.unwrap();
        db.create_comment(viewer.id, quieter.id, "only").await.unwrap();

        let assembler = FeedAssembler::new(db.clone());

        // Recency puts the newer, quieter post first
        let recent = assembler.assemble(viewer.id, FeedOrdering::Recent).await.unwrap();
        assert_eq!(recent[0].id, quieter.id);

        // Popularity puts 5+2 ahead of 3+1
        let by_popularity = assembler.assemble(viewer.id, FeedOrdering::Popularity).await.unwrap();
        assert_eq!(by_popularity[0].id, popular.id);
        assert_eq!(by_popularity[0].likes_count, 5);
        assert_eq!(by_popularity[0].comments_count, 2);
        assert_eq!(by_popularity[1].id, quieter.id);
    }

    #[tokio::test]
    async fn popularity_ties_break_newest_first() {
        let db = Arc::new(memory_db().await);
        let viewer = user(&db, "viewer").await;
        let author = user(&db, "author").await;
        db.insert_follow(viewer.id, author.id).await.unwrap();

        let older = db.create_post(author.id, "older").await.unwrap();
        let newer = db.create_post(author.id, "newer").await.unwrap();

        // Equal popularity on both
        db.insert_like(viewer.id, older.id).await.unwrap();
        db.insert_like(viewer.id, newer.id).await.unwrap();

        let feed = FeedAssembler::new(db.clone())
            .assemble(viewer.id, FeedOrdering::Popularity)
            .await
            .unwrap();

        assert_eq!(feed[0].id, newer.id);
        assert_eq!(feed[1].id, older.id);
    }
}
