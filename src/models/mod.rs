//! Data models
//!
//! This module contains all data structures used throughout the Plaza
//! moderation core. Models represent:
//! - Database entities (User, Session, Post, Comment, ModeratorApplication,
//!   ContactRequest, Transaction, AuditEntry)
//! - Moderation vocabulary (EntityKind, status enumerations)
//! - Notification payloads and dispatcher reports

mod comment;
mod contact_request;
mod moderation;
mod moderator_application;
mod notification;
mod post;
mod session;
mod transaction;
mod user;

pub use comment::{Comment, CommentWithAuthor, CreateCommentInput};
pub use contact_request::{ContactRequest, CreateContactRequestInput};
pub use moderation::{
    ApprovalStatus, AuditEntry, AuditFilter, EntityKind, ModerationStatus, TransactionStatus,
    TransitionOutcome,
};
pub use moderator_application::{
    CreateModeratorApplicationInput, ModeratorApplication, ModeratorApplicationWithApplicant,
};
pub use notification::{DispatchReport, Notification, PendingItem};
pub use post::{CreatePostInput, Post, PostWithCreator, UserSummary};
pub use session::Session;
pub use transaction::{
    CreateTransactionInput, Transaction, TransactionKind, TransactionWithUser,
};
pub use user::{CreateUserInput, UpdateUserStatusInput, User, UserRole, UserStatus};
