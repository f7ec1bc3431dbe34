//! Admin API endpoints
//!
//! Everything under `/api/v1/admin`, open to admins only:
//! - full post and comment listings with a `?status=` filter
//! - moderator applications, contact requests and transactions
//! - status transitions with the admin subset of targets
//! - the moderation audit trail
//! - user listing and account status changes

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{delete, get, put},
    Json, Router,
};

use crate::api::common::{
    json_body, path_id, query_params, AuditQuery, RoleQuery, StatusQuery, TransitionRequest,
    UpdateUserStatusRequest,
};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::moderator;
use crate::models::{
    AuditEntry, AuditFilter, CommentWithAuthor, ContactRequest, EntityKind,
    ModeratorApplicationWithApplicant, PostWithCreator, TransactionWithUser, TransitionOutcome,
    UpdateUserStatusInput, User, UserStatus,
};
use crate::services::moderation::parse_filter;

pub fn router() -> Router<AppState> {
    Router::new()
        // Posts and comments
        .route("/posts", get(list_posts))
        .route("/posts/{id}/status", put(moderator::update_post_status))
        .route("/posts/{id}", delete(moderator::delete_post))
        .route("/comments", get(list_comments))
        .route("/comments/{id}/status", put(moderator::update_comment_status))
        .route("/comments/{id}", delete(moderator::delete_comment))
        // Other review queues
        .route("/moderator-applications", get(list_moderator_applications))
        .route("/contact-requests", get(list_contact_requests))
        .route("/contact-requests/{id}/status", put(update_contact_request_status))
        .route("/transactions", get(list_transactions))
        .route("/transactions/{id}/status", put(update_transaction_status))
        // Audit trail
        .route("/audit", get(list_audit))
        // Accounts
        .route("/users", get(list_users))
        .route("/users/{id}/status", put(update_user_status))
}

/// GET /api/v1/admin/posts?status= - All posts, newest first
async fn list_posts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<PostWithCreator>>, ApiError> {
    let query = query_params(query)?;
    let status = parse_filter("status", query.status.as_deref())?;
    Ok(Json(state.moderation_service.list_posts(status).await?))
}

/// GET /api/v1/admin/comments?status= - All comments, newest first
async fn list_comments(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<CommentWithAuthor>>, ApiError> {
    let query = query_params(query)?;
    let status = parse_filter("status", query.status.as_deref())?;
    Ok(Json(state.moderation_service.list_comments(status).await?))
}

/// GET /api/v1/admin/moderator-applications?status=
async fn list_moderator_applications(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<ModeratorApplicationWithApplicant>>, ApiError> {
    let query = query_params(query)?;
    let status = parse_filter("status", query.status.as_deref())?;
    Ok(Json(
        state.moderation_service.list_moderator_applications(status).await?,
    ))
}

/// GET /api/v1/admin/contact-requests?status=
async fn list_contact_requests(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<ContactRequest>>, ApiError> {
    let query = query_params(query)?;
    let status = parse_filter("status", query.status.as_deref())?;
    Ok(Json(state.moderation_service.list_contact_requests(status).await?))
}

/// PUT /api/v1/admin/contact-requests/{id}/status
async fn update_contact_request_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    moderator::transition(&state, EntityKind::ContactRequest, path, &user, payload).await
}

/// GET /api/v1/admin/transactions?status= - Transactions with their owner
async fn list_transactions(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<TransactionWithUser>>, ApiError> {
    let query = query_params(query)?;
    let status = parse_filter("status", query.status.as_deref())?;
    Ok(Json(state.moderation_service.list_transactions(status).await?))
}

/// PUT /api/v1/admin/transactions/{id}/status
async fn update_transaction_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    moderator::transition(&state, EntityKind::Transaction, path, &user, payload).await
}

/// GET /api/v1/admin/audit?entity_type=&entity_id= - Newest first
async fn list_audit(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let query = query_params(query)?;
    let filter = AuditFilter {
        entity_type: parse_filter("entity_type", query.entity_type.as_deref())?,
        entity_id: parse_filter("entity_id", query.entity_id.as_deref())?,
    };
    Ok(Json(state.moderation_service.list_audit(&filter).await?))
}

/// GET /api/v1/admin/users?role=
async fn list_users(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<Json<Vec<User>>, ApiError> {
    let query = query_params(query)?;
    let role = parse_filter("role", query.role.as_deref())?;
    Ok(Json(state.user_service.list_users(role).await?))
}

/// PUT /api/v1/admin/users/{id}/status - Suspend, ban or reactivate
async fn update_user_status(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserStatusRequest>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let id = path_id(path)?;
    let body = json_body(payload)?;
    let status: UserStatus = body
        .status
        .parse()
        .map_err(|_| ApiError::validation_failed(format!("Invalid status: {}", body.status)))?;

    let user = state
        .user_service
        .update_status(
            &actor,
            id,
            UpdateUserStatusInput {
                status,
                suspended_until: body.suspended_until,
                reason: body.reason.filter(|r| !r.trim().is_empty()),
            },
        )
        .await?;

    Ok(Json(user))
}
