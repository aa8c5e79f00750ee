// Domain models - relational rows plus the read-side view types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub author_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    pub follower_id: i64,
    pub following_id: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Follow => "follow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "follow" => Some(NotificationKind::Follow),
            _ => None,
        }
    }
}

/// What a notification points at. A like targets a post, a comment
/// targets the comment together with its post, a follow targets nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationTarget {
    Post { post_id: i64 },
    Comment { post_id: i64, comment_id: i64 },
    None,
}

impl NotificationTarget {
    /// Split into the two nullable columns of the notifications table.
    pub fn into_columns(self) -> (Option<i64>, Option<i64>) {
        match self {
            NotificationTarget::Post { post_id } => (Some(post_id), None),
            NotificationTarget::Comment { post_id, comment_id } => (Some(post_id), Some(comment_id)),
            NotificationTarget::None => (None, None),
        }
    }

    pub fn from_columns(post_id: Option<i64>, comment_id: Option<i64>) -> Self {
        match (post_id, comment_id) {
            (Some(post_id), Some(comment_id)) => NotificationTarget::Comment { post_id, comment_id },
            (Some(post_id), None) => NotificationTarget::Post { post_id },
            // A comment ref without its post never leaves the fanout;
            // a row like that is unreadable, treat it as untargeted.
            (None, _) => NotificationTarget::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub kind: NotificationKind,
    pub target: NotificationTarget,
    pub created_at: i64,
    pub is_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrdering {
    Recent,
    Popularity,
}

impl FeedOrdering {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "recent" | "created_at" => Some(FeedOrdering::Recent),
            "popularity" => Some(FeedOrdering::Popularity),
            _ => None,
        }
    }
}

// Read-side views

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub likes_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub post_id: i64,
    pub text: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowStats {
    pub followers_count: i64,
    pub following_count: i64,
}
