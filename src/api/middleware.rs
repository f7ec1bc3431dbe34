//! API middleware
//!
//! Contains middleware for:
//! - Session resolution (bearer token or `session` cookie)
//! - The role gate in front of the moderator and admin groups
//!
//! Also home to [`ApiError`], the JSON error body every handler returns.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{User, UserRole};
use crate::services::moderation::{ModerationError, ModerationService};
use crate::services::notification::{NotificationDispatcher, NotificationError};
use crate::services::user::{UserService, UserServiceError};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub moderation_service: Arc<ModerationService>,
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Bearer secret for the cron trigger; `None` disables it
    pub cron_secret: Option<Arc<str>>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthenticated("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Attach structured details to the error body
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_FAILED", message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new("UNAUTHENTICATED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn user_banned(message: impl Into<String>) -> Self {
        Self::new("USER_BANNED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn upstream_failure(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_FAILURE", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_FAILED" => StatusCode::BAD_REQUEST,
            "UNAUTHENTICATED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "USER_BANNED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ModerationError> for ApiError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::ValidationError(msg) => ApiError::validation_failed(msg),
            ModerationError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ModerationError::InternalError(e) => {
                tracing::error!("Moderation operation failed: {:#}", e);
                ApiError::upstream_failure("Persistence failure")
            }
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::ValidationError(msg) => ApiError::validation_failed(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => {
                tracing::error!("User operation failed: {:#}", e);
                ApiError::upstream_failure("Persistence failure")
            }
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::InternalError(e) => {
                tracing::error!("Notification run failed: {:#}", e);
                ApiError::upstream_failure("Notification run failed")
            }
        }
    }
}

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extract session token, bearer first, then the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_string());
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Session middleware: resolve the caller or reject with UNAUTHENTICATED
pub async fn resolve_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthenticated("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Set of roles allowed past a route group
#[derive(Debug, Clone, Copy)]
pub struct RoleGate {
    roles: &'static [UserRole],
}

impl RoleGate {
    pub const MODERATION: RoleGate = RoleGate::new(&[UserRole::Moderator, UserRole::Admin]);
    pub const ADMIN: RoleGate = RoleGate::new(&[UserRole::Admin]);

    pub const fn new(roles: &'static [UserRole]) -> Self {
        assert!(!roles.is_empty(), "a role gate needs at least one role");
        Self { roles }
    }

    pub fn roles(&self) -> &'static [UserRole] {
        self.roles
    }

    /// Decide whether `user` may pass at `now`. Role is checked before
    /// account standing.
    pub fn check(&self, user: &User, now: chrono::DateTime<Utc>) -> Result<(), ApiError> {
        if !self.roles.contains(&user.role) {
            return Err(ApiError::forbidden(format!(
                "Role {} may not access this resource",
                user.role
            )));
        }

        if user.is_blocked_at(now) {
            let message = match user.ban_reason.as_deref() {
                Some(reason) => format!("Account is {}: {}", user.status, reason),
                None => format!("Account is {}", user.status),
            };
            return Err(ApiError::user_banned(message));
        }

        Ok(())
    }
}

/// Role gate middleware, layered inside [`resolve_session`]
pub async fn require_roles(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthenticated("Authentication required"))?;

    if let Err(err) = gate.check(&user.0, Utc::now()) {
        tracing::debug!(user_id = user.0.id, code = %err.error.code, "Role gate refused request");
        return Err(err);
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::models::UserStatus;
    use chrono::Duration;
    use proptest::prelude::*;

    fn role_strategy() -> impl Strategy<Value = UserRole> {
        prop_oneof![Just(UserRole::User), Just(UserRole::Moderator), Just(UserRole::Admin)]
    }

    fn status_strategy() -> impl Strategy<Value = UserStatus> {
        prop_oneof![
            Just(UserStatus::Active),
            Just(UserStatus::Suspended),
            Just(UserStatus::Banned)
        ]
    }

    fn gate_strategy() -> impl Strategy<Value = RoleGate> {
        prop_oneof![Just(RoleGate::MODERATION), Just(RoleGate::ADMIN)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn gate_outcome_matches_role_and_standing(
            gate in gate_strategy(),
            role in role_strategy(),
            status in status_strategy(),
            suspension_minutes in proptest::option::of(-600i64..600),
        ) {
            let now = Utc::now();
            let mut user = User::new("p".to_string(), "p@example.com".to_string(), role);
            user.status = status;
            user.suspended_until = suspension_minutes.map(|m| now + Duration::minutes(m));

            let outcome = gate.check(&user, now);
            if !gate.roles().contains(&role) {
                prop_assert_eq!(outcome.unwrap_err().error.code, "FORBIDDEN");
            } else if user.is_blocked_at(now) {
                prop_assert_eq!(outcome.unwrap_err().error.code, "USER_BANNED");
            } else {
                prop_assert!(outcome.is_ok());
            }
        }
    }
}
