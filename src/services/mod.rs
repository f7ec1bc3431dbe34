//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - the approval state machine table and target validation
//! - moderation listings, transitions and deletes
//! - session resolution and account administration
//! - the pending-item notification dispatcher and its delivery drivers

pub mod delivery;
pub mod moderation;
pub mod notification;
pub mod state_machine;
pub mod user;

pub use delivery::{build_delivery, LogDelivery, NotificationDelivery, SmtpDelivery, WebhookDelivery};
pub use moderation::{parse_filter, ModerationError, ModerationService};
pub use notification::{NotificationDispatcher, NotificationError};
pub use state_machine::{allowed_targets, validate_target, TransitionError, TransitionRule};
pub use user::{UserService, UserServiceError};
