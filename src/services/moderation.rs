//! Moderation service
//!
//! Listing, status transitions and deletion for everything moderators and
//! admins review. Transitions are checked against the state machine table
//! before any row is read.

use std::str::FromStr;
use std::sync::Arc;

use crate::db::repositories::{
    CommentRepository, ContactRequestRepository, ModerationRepository,
    ModeratorApplicationRepository, PostRepository, TransactionRepository,
};
use crate::models::{
    ApprovalStatus, AuditEntry, AuditFilter, CommentWithAuthor, ContactRequest, EntityKind,
    ModeratorApplicationWithApplicant, PostWithCreator, TransactionStatus, TransactionWithUser,
    TransitionOutcome, User,
};
use crate::services::state_machine::{self, TransitionError};

/// Error types for moderation operations
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    /// Bad target status or filter value
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Entity does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TransitionError> for ModerationError {
    fn from(err: TransitionError) -> Self {
        ModerationError::ValidationError(err.to_string())
    }
}

/// Parse an optional query filter. A missing or blank value means no filter.
pub fn parse_filter<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Option<T>, ModerationError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ModerationError::ValidationError(format!("Invalid {}: {}", field, value))),
    }
}

/// Moderation service
pub struct ModerationService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    applications: Arc<dyn ModeratorApplicationRepository>,
    contact_requests: Arc<dyn ContactRequestRepository>,
    transactions: Arc<dyn TransactionRepository>,
    moderation: Arc<dyn ModerationRepository>,
}

impl ModerationService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        applications: Arc<dyn ModeratorApplicationRepository>,
        contact_requests: Arc<dyn ContactRequestRepository>,
        transactions: Arc<dyn TransactionRepository>,
        moderation: Arc<dyn ModerationRepository>,
    ) -> Self {
        Self {
            posts,
            comments,
            applications,
            contact_requests,
            transactions,
            moderation,
        }
    }

    /// Posts not yet APPROVED, newest first
    pub async fn list_unapproved_posts(&self) -> Result<Vec<PostWithCreator>, ModerationError> {
        Ok(self.posts.list_unapproved().await?)
    }

    /// Comments not yet APPROVED, newest first
    pub async fn list_unapproved_comments(&self) -> Result<Vec<CommentWithAuthor>, ModerationError> {
        Ok(self.comments.list_unapproved().await?)
    }

    pub async fn list_posts(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<PostWithCreator>, ModerationError> {
        Ok(self.posts.list(status).await?)
    }

    pub async fn list_comments(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<CommentWithAuthor>, ModerationError> {
        Ok(self.comments.list(status).await?)
    }

    pub async fn list_moderator_applications(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ModeratorApplicationWithApplicant>, ModerationError> {
        Ok(self.applications.list(status).await?)
    }

    pub async fn list_contact_requests(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ContactRequest>, ModerationError> {
        Ok(self.contact_requests.list(status).await?)
    }

    pub async fn list_transactions(
        &self,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<TransactionWithUser>, ModerationError> {
        Ok(self.transactions.list(status).await?)
    }

    pub async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, ModerationError> {
        Ok(self.moderation.list_audit(filter).await?)
    }

    /// Move an entity to `raw_target` on behalf of `actor`.
    ///
    /// The target is validated first; a refused target reads and writes
    /// nothing. Then the entity must exist.
    pub async fn transition(
        &self,
        kind: EntityKind,
        id: i64,
        raw_target: &str,
        actor: &User,
    ) -> Result<TransitionOutcome, ModerationError> {
        let target = state_machine::validate_target(actor.role, kind, raw_target).map_err(|err| {
            tracing::debug!(actor_id = actor.id, %kind, id, "Transition refused: {}", err);
            err
        })?;

        self.moderation
            .apply_transition(kind, id, actor, target)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("{} {}", kind, id)))
    }

    /// Delete a post together with its comments
    pub async fn delete_post(&self, id: i64, actor: &User) -> Result<(), ModerationError> {
        if !self.posts.delete(id).await? {
            return Err(ModerationError::NotFound(format!("{} {}", EntityKind::Post, id)));
        }
        tracing::info!(post_id = id, actor_id = actor.id, "Post deleted");
        Ok(())
    }

    pub async fn delete_comment(&self, id: i64, actor: &User) -> Result<(), ModerationError> {
        if !self.comments.delete(id).await? {
            return Err(ModerationError::NotFound(format!("{} {}", EntityKind::Comment, id)));
        }
        tracing::info!(comment_id = id, actor_id = actor.id, "Comment deleted");
        Ok(())
    }
}
