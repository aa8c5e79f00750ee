// REST API surface - typed requests/responses and the router.
//
// Toggle endpoints mirror their state transition in the status code:
// 201 for the create branch (Liked/Followed), 200 for the delete branch
// (Unliked/Unfollowed).

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    app_state::AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    fanout,
    models::{CommentView, FeedOrdering, Notification, NotificationKind, NotificationTarget, PostView},
    toggle::{FollowToggle, LikeToggle},
};

const POST_LIST_LIMIT: i64 = 100;

// HTTP request/response types

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub created_at: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ListPostsQuery {
    pub author: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: i64,
    pub text: String,
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub ordering: Option<String>,
}

// User handlers

pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required.".to_string()));
    }
    if req.email.trim().is_empty() {
        return Err(AppError::BadRequest("email is required.".to_string()));
    }

    let user = state
        .db
        .create_user(username, req.email.trim(), req.bio.as_deref())
        .await?
        .ok_or_else(|| AppError::Validation(format!("Username '{}' is already taken.", username)))?;

    info!("Created user {} (id {})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            created_at: user.created_at,
            followers_count: 0,
            following_count: 0,
        }),
    ))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;
    let stats = state.db.follow_stats(user.id).await?;

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        bio: user.bio,
        created_at: user.created_at,
        followers_count: stats.followers_count,
        following_count: stats.following_count,
    }))
}

pub async fn toggle_follow_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    AxumPath(user_id): AxumPath<i64>,
) -> AppResult<(StatusCode, Json<Value>)> {
    match state.toggles.toggle_follow(&auth.0, user_id).await? {
        FollowToggle::Followed => Ok((StatusCode::CREATED, Json(json!({"message": "Followed"})))),
        FollowToggle::Unfollowed => Ok((StatusCode::OK, Json(json!({"message": "Unfollowed"})))),
    }
}

// Post handlers

pub async fn create_post_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    if req.content.trim().is_empty() {
        return Err(AppError::BadRequest("content is required.".to_string()));
    }

    let post = state.db.create_post(auth.0.id, &req.content).await?;
    info!("User {} created post {}", auth.0.id, post.id);

    let views = state.feed.hydrate(vec![(post, auth.0.username)]).await?;
    let view = views
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Hydrating a fresh post returned nothing".to_string()))?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_posts_handler(
    State(state): State<AppState>,
    Query(params): Query<ListPostsQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let rows = state.db.posts_with_authors(params.author, POST_LIST_LIMIT).await?;
    let views = state.feed.hydrate(rows).await?;
    Ok(Json(views))
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    AxumPath(post_id): AxumPath<i64>,
) -> AppResult<Json<PostView>> {
    let row = state
        .db
        .post_with_author(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with id {} not found", post_id)))?;

    let views = state.feed.hydrate(vec![row]).await?;
    let view = views
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Hydrating an existing post returned nothing".to_string()))?;

    Ok(Json(view))
}

pub async fn update_post_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    AxumPath(post_id): AxumPath<i64>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<PostView>> {
    let post = state
        .db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with id {} not found", post_id)))?;

    if post.author_id != auth.0.id {
        return Err(AppError::Forbidden("You can only edit your own posts.".to_string()));
    }
    if req.content.trim().is_empty() {
        return Err(AppError::BadRequest("content is required.".to_string()));
    }

    state.db.update_post_content(post.id, &req.content).await?;

    let row = state
        .db
        .post_with_author(post.id)
        .await?
        .ok_or_else(|| AppError::Internal("Post vanished during update".to_string()))?;
    let views = state.feed.hydrate(vec![row]).await?;
    let view = views
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Hydrating an updated post returned nothing".to_string()))?;

    Ok(Json(view))
}

pub async fn delete_post_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    AxumPath(post_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let post = state
        .db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with id {} not found", post_id)))?;

    if post.author_id != auth.0.id {
        return Err(AppError::Forbidden("You can only delete your own posts.".to_string()));
    }

    state.db.delete_post(post.id).await?;
    info!("User {} deleted post {}", auth.0.id, post.id);

    Ok(Json(json!({"id": post.id, "deleted": true})))
}

pub async fn toggle_like_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    AxumPath(post_id): AxumPath<i64>,
) -> AppResult<(StatusCode, Json<Value>)> {
    match state.toggles.toggle_like(&auth.0, post_id).await? {
        LikeToggle::Liked => Ok((StatusCode::CREATED, Json(json!({"message": "Liked"})))),
        LikeToggle::Unliked => Ok((StatusCode::OK, Json(json!({"message": "Unliked"})))),
    }
}

// Comment handlers

pub async fn list_comments_handler(
    State(state): State<AppState>,
    AxumPath(post_id): AxumPath<i64>,
) -> AppResult<Json<Vec<CommentView>>> {
    state
        .db
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with id {} not found", post_id)))?;

    let comments = state.db.comments_for_post(post_id).await?;
    Ok(Json(comments))
}

pub async fn create_comment_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("text is required.".to_string()));
    }

    let post = state
        .db
        .get_post(req.post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post with id {} not found", req.post_id)))?;

    let comment = state.db.create_comment(auth.0.id, post.id, &req.text).await?;
    info!("User {} commented on post {}", auth.0.id, post.id);

    fanout::on_action_created(
        &state.db,
        NotificationKind::Comment,
        auth.0.id,
        post.author_id,
        NotificationTarget::Comment {
            post_id: post.id,
            comment_id: comment.id,
        },
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(CommentView {
            id: comment.id,
            author_id: comment.author_id,
            author_username: auth.0.username,
            post_id: comment.post_id,
            text: comment.text,
            created_at: comment.created_at,
        }),
    ))
}

pub async fn delete_comment_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    AxumPath(comment_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let comment = state
        .db
        .get_comment(comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment with id {} not found", comment_id)))?;

    if comment.author_id != auth.0.id {
        return Err(AppError::Forbidden("You can only delete your own comments.".to_string()));
    }

    state.db.delete_comment(comment.id).await?;

    Ok(Json(json!({"id": comment.id, "deleted": true})))
}

// Feed handler

pub async fn feed_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<FeedQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let ordering = match params.ordering.as_deref() {
        None => FeedOrdering::Recent,
        Some(value) => FeedOrdering::parse(value)
            .ok_or_else(|| AppError::Validation(format!("Unknown ordering: {}", value)))?,
    };

    let views = state.feed.assemble(auth.0.id, ordering).await?;
    Ok(Json(views))
}

// Notification handlers

pub async fn list_notifications_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Notification>>> {
    let notifications = state.db.notifications_for(auth.0.id).await?;
    Ok(Json(notifications))
}

pub async fn mark_notification_read_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    AxumPath(notification_id): AxumPath<i64>,
) -> AppResult<Json<Value>> {
    let updated = state.db.mark_notification_read(notification_id, auth.0.id).await?;
    if !updated {
        return Err(AppError::NotFound(format!(
            "Notification with id {} not found",
            notification_id
        )));
    }

    Ok(Json(json!({"id": notification_id, "read": true})))
}

pub async fn mark_all_notifications_read_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Value>> {
    let updated = state.db.mark_all_notifications_read(auth.0.id).await?;
    Ok(Json(json!({"updated": updated})))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "Social Media API",
        "timestamp": Utc::now().timestamp()
    }))
}

// Create unified router
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Users and the follow toggle
        .route("/users", post(create_user_handler))
        .route("/users/{id}", get(get_user_handler))
        .route("/users/{id}/follow", post(toggle_follow_handler))
        // Posts and the like toggle
        .route("/posts", get(list_posts_handler).post(create_post_handler))
        .route(
            "/posts/{id}",
            get(get_post_handler).put(update_post_handler).delete(delete_post_handler),
        )
        .route("/posts/{id}/like", post(toggle_like_handler))
        .route("/posts/{id}/comments", get(list_comments_handler))
        // Comments
        .route("/comments", post(create_comment_handler))
        .route("/comments/{id}", delete(delete_comment_handler))
        // Read side
        .route("/feed", get(feed_handler))
        .route("/notifications", get(list_notifications_handler))
        .route("/notifications/{id}/read", post(mark_notification_read_handler))
        .route("/notifications/read-all", post(mark_all_notifications_read_handler))
        .with_state(state)
}
