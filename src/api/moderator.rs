//! Moderator API endpoints
//!
//! Review queue for posts and comments, open to moderators and admins:
//! - GET    /moderator/posts               unapproved posts with creator
//! - PUT    /moderator/posts/{id}/status   move a post through the state machine
//! - DELETE /moderator/posts/{id}          delete a post and its comments
//! - the same three for /moderator/comments
//!
//! The status and delete handlers are shared with the admin group; the
//! actor's role decides which targets the state machine accepts.

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    routing::{get, put},
    Json, Router,
};

use crate::api::common::{json_body, path_id, DeleteResponse, TransitionRequest};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CommentWithAuthor, EntityKind, PostWithCreator, TransitionOutcome};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_unapproved_posts))
        .route("/posts/{id}/status", put(update_post_status))
        .route("/posts/{id}", axum::routing::delete(delete_post))
        .route("/comments", get(list_unapproved_comments))
        .route("/comments/{id}/status", put(update_comment_status))
        .route("/comments/{id}", axum::routing::delete(delete_comment))
}

/// GET /api/v1/moderator/posts - Posts awaiting review, newest first
async fn list_unapproved_posts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<PostWithCreator>>, ApiError> {
    Ok(Json(state.moderation_service.list_unapproved_posts().await?))
}

/// GET /api/v1/moderator/comments - Comments awaiting review, newest first
async fn list_unapproved_comments(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CommentWithAuthor>>, ApiError> {
    Ok(Json(state.moderation_service.list_unapproved_comments().await?))
}

/// Shared body of every `PUT .../{id}/status` handler
pub(crate) async fn transition(
    state: &AppState,
    kind: EntityKind,
    path: Result<Path<i64>, PathRejection>,
    user: &AuthenticatedUser,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let id = path_id(path)?;
    let body = json_body(payload)?;

    let outcome = state
        .moderation_service
        .transition(kind, id, &body.status, &user.0)
        .await?;

    Ok(Json(outcome))
}

/// PUT /api/v1/{moderator,admin}/posts/{id}/status
pub(crate) async fn update_post_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    transition(&state, EntityKind::Post, path, &user, payload).await
}

/// PUT /api/v1/{moderator,admin}/comments/{id}/status
pub(crate) async fn update_comment_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    transition(&state, EntityKind::Comment, path, &user, payload).await
}

/// DELETE /api/v1/{moderator,admin}/posts/{id}
///
/// Comments on the post go with it.
pub(crate) async fn delete_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = path_id(path)?;
    state.moderation_service.delete_post(id, &user).await?;
    Ok(Json(DeleteResponse::new(id)))
}

/// DELETE /api/v1/{moderator,admin}/comments/{id}
pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = path_id(path)?;
    state.moderation_service.delete_comment(id, &user).await?;
    Ok(Json(DeleteResponse::new(id)))
}
