// Async social store over a SQLx connection pool.
//
// Uniqueness-constrained relations (likes, follows, usernames) are
// created with INSERT OR IGNORE so a conflicting concurrent insert
// surfaces as rows_affected == 0 instead of an error; callers treat
// that as "the row already exists".

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::models::{
    Comment, CommentView, Follow, FollowStats, Like, Notification, NotificationKind,
    NotificationTarget, Post, User,
};

pub struct SocialDatabase {
    pub pool: SqlitePool,
}

impl SocialDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(SocialDatabase { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        SocialDatabase { pool }
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                bio TEXT,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                author_id INTEGER NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                author_id INTEGER NOT NULL REFERENCES users(id),
                post_id INTEGER NOT NULL REFERENCES posts(id),
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // At most one like per (user, post); the constraint is the
        // backstop for concurrent duplicate toggles.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                post_id INTEGER NOT NULL REFERENCES posts(id),
                created_at INTEGER NOT NULL,
                UNIQUE(user_id, post_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS follows (
                id INTEGER PRIMARY KEY,
                follower_id INTEGER NOT NULL REFERENCES users(id),
                following_id INTEGER NOT NULL REFERENCES users(id),
                created_at INTEGER NOT NULL,
                UNIQUE(follower_id, following_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY,
                sender_id INTEGER NOT NULL REFERENCES users(id),
                receiver_id INTEGER NOT NULL REFERENCES users(id),
                kind TEXT NOT NULL,
                post_id INTEGER,
                comment_id INTEGER,
                created_at INTEGER NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        // Secondary indexes for the read side
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_follower ON follows(follower_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notifications_receiver ON notifications(receiver_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // --- users ---

    /// Returns None when the username is already taken.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        bio: Option<&str>,
    ) -> Result<Option<User>> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO users (username, email, bio, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(bio)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            bio: bio.map(|b| b.to_string()),
            created_at: now,
        }))
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, email, bio, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            bio: row.get("bio"),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn follow_stats(&self, user_id: i64) -> Result<FollowStats> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM follows WHERE following_id = ?) AS followers_count,
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?) AS following_count",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(FollowStats {
            followers_count: row.get("followers_count"),
            following_count: row.get("following_count"),
        })
    }

    // --- posts ---

    pub async fn create_post(&self, author_id: i64, content: &str) -> Result<Post> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO posts (author_id, content, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(author_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id: result.last_insert_rowid(),
            author_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, author_id, content, created_at, updated_at FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_post))
    }

    pub async fn post_with_author(&self, id: i64) -> Result<Option<(Post, String)>> {
        let row = sqlx::query(
            "SELECT p.id, p.author_id, p.content, p.created_at, p.updated_at, u.username
             FROM posts p JOIN users u ON u.id = p.author_id
             WHERE p.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let username: String = row.get("username");
            (map_post(row), username)
        }))
    }

    pub async fn posts_with_authors(
        &self,
        author_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<(Post, String)>> {
        let rows = match author_id {
            Some(author_id) => {
                sqlx::query(
                    "SELECT p.id, p.author_id, p.content, p.created_at, p.updated_at, u.username
                     FROM posts p JOIN users u ON u.id = p.author_id
                     WHERE p.author_id = ?
                     ORDER BY p.created_at DESC, p.id DESC LIMIT ?",
                )
                .bind(author_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT p.id, p.author_id, p.content, p.created_at, p.updated_at, u.username
                     FROM posts p JOIN users u ON u.id = p.author_id
                     ORDER BY p.created_at DESC, p.id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let username: String = row.get("username");
                (map_post(row), username)
            })
            .collect())
    }

    /// Posts authored by users the viewer follows, newest first.
    pub async fn feed_candidates(&self, viewer_id: i64) -> Result<Vec<(Post, String)>> {
        let rows = sqlx::query(
            "SELECT p.id, p.author_id, p.content, p.created_at, p.updated_at, u.username
             FROM posts p JOIN users u ON u.id = p.author_id
             WHERE p.author_id IN (SELECT following_id FROM follows WHERE follower_id = ?)
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let username: String = row.get("username");
                (map_post(row), username)
            })
            .collect())
    }

    /// Author is immutable; updates touch content (and updated_at) only.
    pub async fn update_post_content(&self, id: i64, content: &str) -> Result<()> {
        let now = Utc::now().timestamp();

        sqlx::query("UPDATE posts SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete a post and its dependent comment/like rows atomically.
    /// Notifications are retained; cleanup of stale refs is external.
    pub async fn delete_post(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM likes WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM comments WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Like and comment counts for a post, counted at query time.
    pub async fn post_counts(&self, post_id: i64) -> Result<(i64, i64)> {
        let row = sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM likes WHERE post_id = ?) AS likes_count,
                (SELECT COUNT(*) FROM comments WHERE post_id = ?) AS comments_count",
        )
        .bind(post_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("likes_count"), row.get("comments_count")))
    }

    // --- comments ---

    pub async fn create_comment(&self, author_id: i64, post_id: i64, text: &str) -> Result<Comment> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO comments (author_id, post_id, text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(author_id)
        .bind(post_id)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            author_id,
            post_id,
            text: text.to_string(),
            created_at: now,
        })
    }

    pub async fn get_comment(&self, id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, author_id, post_id, text, created_at FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Comment {
            id: row.get("id"),
            author_id: row.get("author_id"),
            post_id: row.get("post_id"),
            text: row.get("text"),
            created_at: row.get("created_at"),
        }))
    }

    pub async fn comments_for_post(&self, post_id: i64) -> Result<Vec<CommentView>> {
        let rows = sqlx::query(
            "SELECT c.id, c.author_id, c.post_id, c.text, c.created_at, u.username
             FROM comments c JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CommentView {
                id: row.get("id"),
                author_id: row.get("author_id"),
                author_username: row.get("username"),
                post_id: row.get("post_id"),
                text: row.get("text"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn delete_comment(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // --- likes ---

    pub async fn like_exists(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Returns None when the (user, post) pair is already present.
    pub async fn insert_like(&self, user_id: i64, post_id: i64) -> Result<Option<Like>> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO likes (user_id, post_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Like {
            id: result.last_insert_rowid(),
            user_id,
            post_id,
            created_at: now,
        }))
    }

    pub async fn delete_like(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_likes(&self, user_id: i64, post_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get(0))
    }

    // --- follows ---

    pub async fn follow_exists(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM follows WHERE follower_id = ? AND following_id = ?")
            .bind(follower_id)
            .bind(following_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Returns None when the (follower, following) pair is already present.
    pub async fn insert_follow(&self, follower_id: i64, following_id: i64) -> Result<Option<Follow>> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Follow {
            id: result.last_insert_rowid(),
            follower_id,
            following_id,
            created_at: now,
        }))
    }

    pub async fn delete_follow(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // --- notifications ---

    pub async fn create_notification(
        &self,
        sender_id: i64,
        receiver_id: i64,
        kind: NotificationKind,
        target: NotificationTarget,
    ) -> Result<Notification> {
        let now = Utc::now().timestamp();
        let (post_id, comment_id) = target.into_columns();

        let result = sqlx::query(
            "INSERT INTO notifications (sender_id, receiver_id, kind, post_id, comment_id, created_at, is_read)
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(kind.as_str())
        .bind(post_id)
        .bind(comment_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Notification {
            id: result.last_insert_rowid(),
            sender_id,
            receiver_id,
            kind,
            target,
            created_at: now,
            is_read: false,
        })
    }

    pub async fn notifications_for(&self, receiver_id: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, kind, post_id, comment_id, created_at, is_read
             FROM notifications WHERE receiver_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in rows {
            notifications.push(map_notification(row)?);
        }

        Ok(notifications)
    }

    pub async fn count_notifications(&self, receiver_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM notifications WHERE receiver_id = ?")
            .bind(receiver_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get(0))
    }

    /// Flip is_read on one notification. Scoped to the receiver so a
    /// user cannot acknowledge someone else's notification.
    pub async fn mark_notification_read(&self, id: i64, receiver_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND receiver_id = ?")
            .bind(id)
            .bind(receiver_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_notifications_read(&self, receiver_id: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE receiver_id = ? AND is_read = 0")
            .bind(receiver_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn map_post(row: sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn map_notification(row: sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let kind_str: String = row.get("kind");
    let kind = NotificationKind::parse(&kind_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown notification kind in store: {}", kind_str))?;

    Ok(Notification {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        kind,
        target: NotificationTarget::from_columns(row.get("post_id"), row.get("comment_id")),
        created_at: row.get("created_at"),
        is_read: row.get("is_read"),
    })
}

/// In-memory database for tests. A single pooled connection, otherwise
/// each checkout would see its own empty :memory: database.
#[cfg(test)]
pub(crate) async fn memory_db() -> SocialDatabase {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");

    let db = SocialDatabase::from_pool(pool);
    db.init().await.expect("initialize schema");
    db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let db = memory_db().await;

        let first = db.create_user("alice", "alice@example.com", None).await.unwrap();
        assert!(first.is_some());

        let second = db.create_user("alice", "other@example.com", None).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn insert_like_reports_conflict_as_none() {
        let db = memory_db().await;
        let alice = db.create_user("alice", "alice@example.com", None).await.unwrap().unwrap();
        let bob = db.create_user("bob", "bob@example.com", None).await.unwrap().unwrap();
        let post = db.create_post(bob.id, "hello").await.unwrap();

        assert!(db.insert_like(alice.id, post.id).await.unwrap().is_some());
        // Second insert hits UNIQUE(user_id, post_id)
        assert!(db.insert_like(alice.id, post.id).await.unwrap().is_none());
        assert_eq!(db.count_likes(alice.id, post.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_like_reports_whether_a_row_was_removed() {
        let db = memory_db().await;
        let alice = db.create_user("alice", "alice@example.com", None).await.unwrap().unwrap();
        let bob = db.create_user("bob", "bob@example.com", None).await.unwrap().unwrap();
        let post = db.create_post(bob.id, "hello").await.unwrap();

        assert!(!db.delete_like(alice.id, post.id).await.unwrap());
        db.insert_like(alice.id, post.id).await.unwrap();
        assert!(db.delete_like(alice.id, post.id).await.unwrap());
        assert!(!db.delete_like(alice.id, post.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_post_removes_dependent_rows() {
        let db = memory_db().await;
        let alice = db.create_user("alice", "alice@example.com", None).await.unwrap().unwrap();
        let bob = db.create_user("bob", "bob@example.com", None).await.unwrap().unwrap();
        let post = db.create_post(bob.id, "hello").await.unwrap();
        db.insert_like(alice.id, post.id).await.unwrap();
        db.create_comment(alice.id, post.id, "nice").await.unwrap();

        db.delete_post(post.id).await.unwrap();

        assert!(db.get_post(post.id).await.unwrap().is_none());
        assert_eq!(db.post_counts(post.id).await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn mark_read_is_scoped_to_the_receiver() {
        let db = memory_db().await;
        let alice = db.create_user("alice", "alice@example.com", None).await.unwrap().unwrap();
        let bob = db.create_user("bob", "bob@example.com", None).await.unwrap().unwrap();

        let n = db
            .create_notification(alice.id, bob.id, NotificationKind::Follow, NotificationTarget::None)
            .await
            .unwrap();

        // alice is the sender, not the receiver
        assert!(!db.mark_notification_read(n.id, alice.id).await.unwrap());
        assert!(db.mark_notification_read(n.id, bob.id).await.unwrap());

        let notifications = db.notifications_for(bob.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].is_read);
    }
}
