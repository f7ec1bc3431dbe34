//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for one table; the moderation
//! repository spans every moderated table.

pub mod comment;
pub mod contact_request;
pub mod moderation;
pub mod moderator_application;
pub mod notification_mark;
pub mod post;
pub mod session;
pub mod transaction;
pub mod user;

pub use comment::{CommentRepository, CommentRepositoryImpl};
pub use contact_request::{ContactRequestRepository, SqlxContactRequestRepository};
pub use moderation::{ModerationRepository, SqlxModerationRepository};
pub use moderator_application::{
    ModeratorApplicationRepository, SqlxModeratorApplicationRepository,
};
pub use notification_mark::{NotificationMarkRepository, SqlxNotificationMarkRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use transaction::{SqlxTransactionRepository, TransactionRepository};
pub use user::{SqlxUserRepository, UserRepository};
