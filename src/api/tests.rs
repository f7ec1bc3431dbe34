//! End-to-end tests for the HTTP surface, run against the full router and
//! an in-memory SQLite database.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use super::{build_router, AppState};
use crate::config::NotificationConfig;
use crate::db::repositories::{
    CommentRepository, CommentRepositoryImpl, ContactRequestRepository, PostRepository,
    SqlxContactRequestRepository, SqlxModerationRepository, SqlxModeratorApplicationRepository,
    SqlxNotificationMarkRepository, SqlxPostRepository, SqlxSessionRepository,
    SqlxTransactionRepository, SqlxUserRepository, TransactionRepository, UserRepository,
};
use crate::db::{create_test_pool, migrations, DynDatabasePool};
use crate::models::{
    CreateCommentInput, CreateContactRequestInput, CreatePostInput, CreateTransactionInput,
    CreateUserInput, TransactionKind, UpdateUserStatusInput, User, UserRole, UserStatus,
};
use crate::services::{LogDelivery, ModerationService, NotificationDispatcher, UserService};

const CRON_SECRET: &str = "cron-secret";

struct Harness {
    server: TestServer,
    pool: DynDatabasePool,
    admin: User,
    moderator: User,
    member: User,
    admin_token: String,
    moderator_token: String,
    member_token: String,
}

async fn harness() -> Harness {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        SqlxSessionRepository::boxed(pool.clone()),
    ));
    let moderation_service = Arc::new(ModerationService::new(
        SqlxPostRepository::boxed(pool.clone()),
        Arc::new(CommentRepositoryImpl::new(pool.clone())),
        SqlxModeratorApplicationRepository::boxed(pool.clone()),
        SqlxContactRequestRepository::boxed(pool.clone()),
        SqlxTransactionRepository::boxed(pool.clone()),
        SqlxModerationRepository::boxed(pool.clone()),
    ));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        SqlxModerationRepository::boxed(pool.clone()),
        SqlxNotificationMarkRepository::boxed(pool.clone()),
        Arc::new(LogDelivery),
        &NotificationConfig::default(),
    ));

    let mut tokens = Vec::new();
    let mut users = Vec::new();
    for (name, role) in [
        ("admin", UserRole::Admin),
        ("mod", UserRole::Moderator),
        ("member", UserRole::User),
    ] {
        let user = user_repo
            .create(&CreateUserInput::new(name, format!("{}@example.com", name), role))
            .await
            .unwrap();
        tokens.push(user_service.create_session(user.id).await.unwrap().id);
        users.push(user);
    }

    let state = AppState {
        user_service,
        moderation_service,
        dispatcher,
        cron_secret: Some(Arc::from(CRON_SECRET)),
    };
    let server = TestServer::new(build_router(state, "http://localhost:3000")).unwrap();

    let mut users = users.into_iter();
    let mut tokens = tokens.into_iter();
    Harness {
        server,
        pool,
        admin: users.next().unwrap(),
        moderator: users.next().unwrap(),
        member: users.next().unwrap(),
        admin_token: tokens.next().unwrap(),
        moderator_token: tokens.next().unwrap(),
        member_token: tokens.next().unwrap(),
    }
}

async fn create_post(h: &Harness, content: &str) -> i64 {
    SqlxPostRepository::new(h.pool.clone())
        .create(&CreatePostInput {
            creator_id: h.member.id,
            content: content.to_string(),
        })
        .await
        .unwrap()
        .id
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

// ============================================================================
// Role gate
// ============================================================================

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthenticated() {
    let h = harness().await;

    let response = h.server.get("/api/v1/moderator/posts").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHENTICATED");

    let response = h
        .server
        .get("/api/v1/moderator/posts")
        .authorization_bearer("not-a-session")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_is_forbidden() {
    let h = harness().await;

    let response = h
        .server
        .get("/api/v1/moderator/posts")
        .authorization_bearer(&h.member_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_moderator_cannot_reach_admin_group() {
    let h = harness().await;

    let response = h
        .server
        .get("/api/v1/admin/transactions")
        .authorization_bearer(&h.moderator_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_banned_moderator_is_refused() {
    let h = harness().await;
    SqlxUserRepository::new(h.pool.clone())
        .update_status(
            h.moderator.id,
            &UpdateUserStatusInput {
                status: UserStatus::Banned,
                suspended_until: None,
                reason: Some("spam".to_string()),
            },
        )
        .await
        .unwrap();

    let response = h
        .server
        .get("/api/v1/moderator/posts")
        .authorization_bearer(&h.moderator_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"]["code"], "USER_BANNED");
}

// ============================================================================
// Moderator group
// ============================================================================

#[tokio::test]
async fn test_moderator_rejects_but_cannot_approve() {
    let h = harness().await;
    let post = create_post(&h, "p1").await;

    let response = h
        .server
        .put(&format!("/api/v1/moderator/posts/{}/status", post))
        .authorization_bearer(&h.moderator_token)
        .json(&json!({ "status": "APPROVED" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");

    let queue = h
        .server
        .get("/api/v1/moderator/posts")
        .authorization_bearer(&h.moderator_token)
        .await
        .json::<Value>();
    assert_eq!(queue[0]["approval_status"], "PENDING");

    let response = h
        .server
        .put(&format!("/api/v1/moderator/posts/{}/status", post))
        .authorization_bearer(&h.moderator_token)
        .json(&json!({ "status": "rejected" }))
        .await;
    response.assert_status_ok();
    let outcome = response.json::<Value>();
    assert_eq!(outcome["previous_status"], "PENDING");
    assert_eq!(outcome["status"], "REJECTED");
}

#[tokio::test]
async fn test_unknown_entity_is_not_found() {
    let h = harness().await;

    let response = h
        .server
        .put("/api/v1/moderator/comments/999/status")
        .authorization_bearer(&h.moderator_token)
        .json(&json!({ "status": "REJECTED" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");

    let response = h
        .server
        .delete("/api/v1/moderator/posts/999")
        .authorization_bearer(&h.moderator_token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_and_id_are_validation_failures() {
    let h = harness().await;
    let post = create_post(&h, "p").await;

    let response = h
        .server
        .put(&format!("/api/v1/moderator/posts/{}/status", post))
        .authorization_bearer(&h.moderator_token)
        .json(&json!({ "state": "REJECTED" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");

    let response = h
        .server
        .delete("/api/v1/moderator/posts/abc")
        .authorization_bearer(&h.moderator_token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_queue_excludes_approved_and_delete_cascades() {
    let h = harness().await;
    let approved = create_post(&h, "fine").await;
    let waiting = create_post(&h, "waiting").await;
    let comments = CommentRepositoryImpl::new(h.pool.clone());
    let comment = comments
        .create(&CreateCommentInput {
            post_id: waiting,
            user_id: h.member.id,
            content: "hello".to_string(),
        })
        .await
        .unwrap();

    h.server
        .put(&format!("/api/v1/admin/posts/{}/status", approved))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "APPROVED" }))
        .await
        .assert_status_ok();

    let queue = h
        .server
        .get("/api/v1/moderator/posts")
        .authorization_bearer(&h.moderator_token)
        .await
        .json::<Value>();
    assert_eq!(ids(&queue), vec![waiting]);
    assert_eq!(queue[0]["creator"]["username"], "member");

    let response = h
        .server
        .delete(&format!("/api/v1/moderator/posts/{}", waiting))
        .authorization_bearer(&h.moderator_token)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["deleted"], true);

    let queue = h
        .server
        .get("/api/v1/moderator/posts")
        .authorization_bearer(&h.moderator_token)
        .await
        .json::<Value>();
    assert_eq!(queue, json!([]));
    assert!(comments.get_by_id(comment.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleted_comment_leaves_queue_and_cannot_be_deleted_twice() {
    let h = harness().await;
    let post = create_post(&h, "thread").await;
    let comment = CommentRepositoryImpl::new(h.pool.clone())
        .create(&CreateCommentInput {
            post_id: post,
            user_id: h.member.id,
            content: "spam".to_string(),
        })
        .await
        .unwrap();

    let queue = h
        .server
        .get("/api/v1/moderator/comments")
        .authorization_bearer(&h.moderator_token)
        .await
        .json::<Value>();
    assert_eq!(ids(&queue), vec![comment.id]);

    let response = h
        .server
        .delete(&format!("/api/v1/moderator/comments/{}", comment.id))
        .authorization_bearer(&h.moderator_token)
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["id"], comment.id);
    assert_eq!(body["deleted"], true);

    let queue = h
        .server
        .get("/api/v1/moderator/comments")
        .authorization_bearer(&h.moderator_token)
        .await
        .json::<Value>();
    assert!(!ids(&queue).contains(&comment.id));

    let response = h
        .server
        .delete(&format!("/api/v1/moderator/comments/{}", comment.id))
        .authorization_bearer(&h.moderator_token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
}

// ============================================================================
// Admin group
// ============================================================================

#[tokio::test]
async fn test_admin_listing_filters() {
    let h = harness().await;
    let first = create_post(&h, "one").await;
    let second = create_post(&h, "two").await;
    h.server
        .put(&format!("/api/v1/admin/posts/{}/status", first))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "APPROVED" }))
        .await
        .assert_status_ok();

    let all = h
        .server
        .get("/api/v1/admin/posts")
        .authorization_bearer(&h.admin_token)
        .await
        .json::<Value>();
    assert_eq!(ids(&all), vec![second, first]);

    let approved = h
        .server
        .get("/api/v1/admin/posts")
        .add_query_param("status", "approved")
        .authorization_bearer(&h.admin_token)
        .await
        .json::<Value>();
    assert_eq!(ids(&approved), vec![first]);

    let response = h
        .server
        .get("/api/v1/admin/posts")
        .add_query_param("status", "COMPLETED")
        .authorization_bearer(&h.admin_token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");

    let empty = h
        .server
        .get("/api/v1/admin/moderator-applications")
        .authorization_bearer(&h.admin_token)
        .await;
    empty.assert_status_ok();
    assert_eq!(empty.json::<Value>(), json!([]));
}

#[tokio::test]
async fn test_malformed_query_string_is_validation_failure() {
    let h = harness().await;

    for path in [
        "/api/v1/admin/posts",
        "/api/v1/admin/comments",
        "/api/v1/admin/transactions",
    ] {
        let response = h
            .server
            .get(path)
            .add_query_param("status", "PENDING")
            .add_query_param("status", "REJECTED")
            .authorization_bearer(&h.admin_token)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");
    }

    let response = h
        .server
        .get("/api/v1/admin/users")
        .add_query_param("role", "ADMIN")
        .add_query_param("role", "USER")
        .authorization_bearer(&h.admin_token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_admin_completes_transaction_and_audit_records_it() {
    let h = harness().await;
    let tx = SqlxTransactionRepository::new(h.pool.clone())
        .create(&CreateTransactionInput {
            user_id: h.member.id,
            kind: TransactionKind::Checkout,
            amount_cents: 2500,
            currency: "USD".to_string(),
        })
        .await
        .unwrap();

    let response = h
        .server
        .put(&format!("/api/v1/admin/transactions/{}/status", tx.id))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "APPROVED" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    h.server
        .put(&format!("/api/v1/admin/transactions/{}/status", tx.id))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "COMPLETED" }))
        .await
        .assert_status_ok();

    let listed = h
        .server
        .get("/api/v1/admin/transactions")
        .add_query_param("status", "COMPLETED")
        .authorization_bearer(&h.admin_token)
        .await
        .json::<Value>();
    assert_eq!(ids(&listed), vec![tx.id]);
    assert_eq!(listed[0]["user"]["username"], "member");

    let audit = h
        .server
        .get("/api/v1/admin/audit")
        .add_query_param("entity_type", "TRANSACTION")
        .add_query_param("entity_id", tx.id.to_string())
        .authorization_bearer(&h.admin_token)
        .await
        .json::<Value>();
    let audit = audit.as_array().unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["from_status"], "PENDING");
    assert_eq!(audit[0]["to_status"], "COMPLETED");
    assert_eq!(audit[0]["actor_id"], h.admin.id);

    let response = h
        .server
        .get("/api/v1/admin/audit")
        .add_query_param("entity_id", "seven")
        .authorization_bearer(&h.admin_token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_moves_contact_request() {
    let h = harness().await;
    let request = SqlxContactRequestRepository::new(h.pool.clone())
        .create(&CreateContactRequestInput {
            name: "Visitor".to_string(),
            email: "visitor@example.com".to_string(),
            message: "Hi".to_string(),
        })
        .await
        .unwrap();

    h.server
        .put(&format!("/api/v1/admin/contact-requests/{}/status", request.id))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "APPROVED" }))
        .await
        .assert_status_ok();

    let listed = h
        .server
        .get("/api/v1/admin/contact-requests")
        .add_query_param("status", "APPROVED")
        .authorization_bearer(&h.admin_token)
        .await
        .json::<Value>();
    assert_eq!(ids(&listed), vec![request.id]);
}

#[tokio::test]
async fn test_admin_bans_member_who_is_then_refused() {
    let h = harness().await;

    let response = h
        .server
        .put(&format!("/api/v1/admin/users/{}/status", h.moderator.id))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "suspended", "suspended_until": (Utc::now() + Duration::days(1)).to_rfc3339(), "reason": "cool down" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "SUSPENDED");

    h.server
        .get("/api/v1/moderator/comments")
        .authorization_bearer(&h.moderator_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let moderators = h
        .server
        .get("/api/v1/admin/users")
        .add_query_param("role", "MODERATOR")
        .authorization_bearer(&h.admin_token)
        .await
        .json::<Value>();
    assert_eq!(ids(&moderators), vec![h.moderator.id]);

    h.server
        .put(&format!("/api/v1/admin/users/{}/status", h.admin.id))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "BANNED" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    h.server
        .put(&format!("/api/v1/admin/users/{}/status", h.member.id))
        .authorization_bearer(&h.admin_token)
        .json(&json!({ "status": "GONE" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Cron trigger
// ============================================================================

#[tokio::test]
async fn test_cron_requires_secret() {
    let h = harness().await;

    h.server
        .post("/api/v1/cron/notify-pending")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    h.server
        .post("/api/v1/cron/notify-pending")
        .authorization_bearer(&h.admin_token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_notifies_stale_transactions_once() {
    let h = harness().await;
    let tx = SqlxTransactionRepository::new(h.pool.clone())
        .create(&CreateTransactionInput {
            user_id: h.member.id,
            kind: TransactionKind::Checkout,
            amount_cents: 900,
            currency: "EUR".to_string(),
        })
        .await
        .unwrap();
    sqlx::query("UPDATE transactions SET updated_at = ? WHERE id = ?")
        .bind(Utc::now() - Duration::hours(3))
        .bind(tx.id)
        .execute(h.pool.as_sqlite().unwrap())
        .await
        .unwrap();

    let first = h
        .server
        .post("/api/v1/cron/notify-pending")
        .authorization_bearer(CRON_SECRET)
        .await;
    first.assert_status_ok();
    assert_eq!(
        first.json::<Value>(),
        json!({ "scanned": 1, "notified": 1, "skipped": 0, "failed": 0 })
    );

    let second = h
        .server
        .post("/api/v1/cron/notify-pending")
        .authorization_bearer(CRON_SECRET)
        .await
        .json::<Value>();
    assert_eq!(second["notified"], 0);
    assert_eq!(second["skipped"], 1);
}
