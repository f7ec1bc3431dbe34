//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityKind;

/// An entity that has been waiting in PENDING past the configured threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub kind: EntityKind,
    pub id: i64,
    /// Owning user, when the entity has one
    pub user_id: Option<i64>,
    /// Address the owner can be reached at
    pub email: Option<String>,
    /// When the entity last changed status; identifies the pending window
    pub pending_since: DateTime<Utc>,
}

impl PendingItem {
    /// Key identifying the pending window this item is in.
    ///
    /// A transition out of PENDING and back refreshes `pending_since`,
    /// which opens a new window.
    pub fn window_key(&self) -> String {
        self.pending_since.to_rfc3339()
    }
}

/// Payload handed to the delivery collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Counters for one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Pending entities past the threshold
    pub scanned: usize,
    /// Notifications delivered
    pub notified: usize,
    /// Entities already notified in their current window
    pub skipped: usize,
    /// Entities whose claim or delivery failed
    pub failed: usize,
}
