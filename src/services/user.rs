//! User service
//!
//! Session resolution for the role gate, plus the admin-facing user
//! operations:
//! - resolve a bearer token to a user, dropping expired sessions
//! - issue sessions for the identity collaborator
//! - list users by role
//! - suspend, ban or reactivate an account

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, UpdateUserStatusInput, User, UserRole, UserStatus};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User not found
    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for session resolution and account administration
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown tokens, expired sessions (which are
    /// deleted on the way) and sessions whose user no longer exists.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Issue a new session for `user_id`
    pub async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        if self.user_repo.get_by_id(user_id).await?.is_none() {
            return Err(UserServiceError::NotFound);
        }

        let now = Utc::now();
        let expires_at = Duration::try_days(self.session_expiration_days)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Session lifetime of {} days is out of range",
                    self.session_expiration_days
                )
            })?;
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at,
            created_at: now,
        };

        Ok(self.session_repo.create(&session).await?)
    }

    /// Remove expired sessions
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self.session_repo.delete_expired().await?)
    }

    /// List users, optionally restricted to one role
    pub async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list(role).await?)
    }

    /// Change an account's status on behalf of `actor`.
    ///
    /// ACTIVE clears any suspension and reason. BANNED is permanent, so
    /// `suspended_until` is dropped. SUSPENDED keeps `suspended_until`,
    /// which must be in the future when given; without it the suspension
    /// lasts until lifted. Nobody can change their own status.
    pub async fn update_status(
        &self,
        actor: &User,
        user_id: i64,
        input: UpdateUserStatusInput,
    ) -> Result<User, UserServiceError> {
        if actor.id == user_id {
            return Err(UserServiceError::ValidationError(
                "Cannot change your own account status".to_string(),
            ));
        }

        let input = match input.status {
            UserStatus::Active => UpdateUserStatusInput {
                status: UserStatus::Active,
                suspended_until: None,
                reason: None,
            },
            UserStatus::Banned => UpdateUserStatusInput {
                suspended_until: None,
                ..input
            },
            UserStatus::Suspended => {
                if input.suspended_until.is_some_and(|until| until <= Utc::now()) {
                    return Err(UserServiceError::ValidationError(
                        "suspended_until must be in the future".to_string(),
                    ));
                }
                input
            }
        };

        let user = self
            .user_repo
            .update_status(user_id, &input)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        tracing::info!(
            user_id,
            actor_id = actor.id,
            status = %user.status,
            "Account status changed"
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::CreateUserInput;

    async fn setup_test_service() -> (UserService, Arc<dyn UserRepository>, Arc<dyn SessionRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool);
        let service = UserService::new(user_repo.clone(), session_repo.clone());
        (service, user_repo, session_repo)
    }

    async fn create_user(repo: &Arc<dyn UserRepository>, name: &str, role: UserRole) -> User {
        repo.create(&CreateUserInput::new(name, format!("{}@example.com", name), role))
            .await
            .expect("Failed to create user")
    }

    #[tokio::test]
    async fn test_validate_session_success() {
        let (service, users, _) = setup_test_service().await;
        let user = create_user(&users, "alice", UserRole::Moderator).await;

        let session = service.create_session(user.id).await.unwrap();
        let resolved = service
            .validate_session(&session.id)
            .await
            .expect("Failed to validate session")
            .expect("User not found");

        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.role, UserRole::Moderator);
    }

    #[tokio::test]
    async fn test_create_session_rejects_out_of_range_lifetime() {
        let (_, users, sessions) = setup_test_service().await;
        let user = create_user(&users, "carol", UserRole::Moderator).await;
        let service = UserService::with_session_expiration(users, sessions, i64::MAX);

        let result = service.create_session(user.id).await;

        assert!(matches!(result, Err(UserServiceError::InternalError(_))));
    }

    #[tokio::test]
    async fn test_validate_session_unknown_token() {
        let (service, _, _) = setup_test_service().await;
        assert!(service.validate_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validate_session_expired_is_removed() {
        let (service, users, sessions) = setup_test_service().await;
        let user = create_user(&users, "bob", UserRole::User).await;

        let now = Utc::now();
        sessions
            .create(&Session {
                id: "stale".to_string(),
                user_id: user.id,
                expires_at: now - Duration::minutes(1),
                created_at: now - Duration::days(8),
            })
            .await
            .unwrap();

        assert!(service.validate_session("stale").await.unwrap().is_none());
        assert!(sessions.get_by_id("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_session_for_missing_user() {
        let (service, _, _) = setup_test_service().await;
        assert!(matches!(
            service.create_session(77).await,
            Err(UserServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_status_rules() {
        let (service, users, _) = setup_test_service().await;
        let admin = create_user(&users, "admin", UserRole::Admin).await;
        let target = create_user(&users, "target", UserRole::User).await;

        let banned = service
            .update_status(
                &admin,
                target.id,
                UpdateUserStatusInput {
                    status: UserStatus::Banned,
                    suspended_until: Some(Utc::now() + Duration::days(1)),
                    reason: Some("abuse".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(banned.status, UserStatus::Banned);
        assert!(banned.suspended_until.is_none());
        assert_eq!(banned.ban_reason.as_deref(), Some("abuse"));

        let active = service
            .update_status(
                &admin,
                target.id,
                UpdateUserStatusInput {
                    status: UserStatus::Active,
                    suspended_until: None,
                    reason: Some("ignored".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(active.status, UserStatus::Active);
        assert!(active.ban_reason.is_none());

        let past = service
            .update_status(
                &admin,
                target.id,
                UpdateUserStatusInput {
                    status: UserStatus::Suspended,
                    suspended_until: Some(Utc::now() - Duration::days(1)),
                    reason: None,
                },
            )
            .await;
        assert!(matches!(past, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_own_status_refused() {
        let (service, users, _) = setup_test_service().await;
        let admin = create_user(&users, "admin", UserRole::Admin).await;

        let result = service
            .update_status(
                &admin,
                admin.id,
                UpdateUserStatusInput {
                    status: UserStatus::Banned,
                    suspended_until: None,
                    reason: None,
                },
            )
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_status_missing_user() {
        let (service, users, _) = setup_test_service().await;
        let admin = create_user(&users, "admin", UserRole::Admin).await;

        let result = service
            .update_status(
                &admin,
                404,
                UpdateUserStatusInput {
                    status: UserStatus::Active,
                    suspended_until: None,
                    reason: None,
                },
            )
            .await;
        assert!(matches!(result, Err(UserServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_users_by_role() {
        let (service, users, _) = setup_test_service().await;
        create_user(&users, "a", UserRole::Admin).await;
        create_user(&users, "m", UserRole::Moderator).await;

        assert_eq!(service.list_users(None).await.unwrap().len(), 2);
        assert_eq!(service.list_users(Some(UserRole::Admin)).await.unwrap().len(), 1);
    }
}
