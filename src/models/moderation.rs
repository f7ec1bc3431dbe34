//! Moderation model
//!
//! Entity kinds that move through the approval state machine, the status
//! values they can hold, and the audit entries written per transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UserRole;

/// Kinds of entity whose status is changed by a moderator or admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Post,
    Comment,
    ContactRequest,
    Transaction,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Post,
        EntityKind::Comment,
        EntityKind::ContactRequest,
        EntityKind::Transaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "POST",
            EntityKind::Comment => "COMMENT",
            EntityKind::ContactRequest => "CONTACT_REQUEST",
            EntityKind::Transaction => "TRANSACTION",
        }
    }

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Post => "posts",
            EntityKind::Comment => "comments",
            EntityKind::ContactRequest => "contact_requests",
            EntityKind::Transaction => "transactions",
        }
    }

    /// Column holding the moderation status
    pub fn status_column(&self) -> &'static str {
        match self {
            EntityKind::Post | EntityKind::Comment => "approval_status",
            EntityKind::ContactRequest | EntityKind::Transaction => "status",
        }
    }

    /// The full status enumeration for this kind
    pub fn states(&self) -> &'static [ModerationStatus] {
        match self {
            EntityKind::Post | EntityKind::Comment | EntityKind::ContactRequest => {
                &ApprovalStatus::STATES
            }
            EntityKind::Transaction => &TransactionStatus::STATES,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POST" => Ok(EntityKind::Post),
            "COMMENT" => Ok(EntityKind::Comment),
            "CONTACT_REQUEST" => Ok(EntityKind::ContactRequest),
            "TRANSACTION" => Ok(EntityKind::Transaction),
            _ => Err(anyhow::anyhow!("Invalid entity type: {}", s)),
        }
    }
}

/// Every status value any moderated entity can hold.
///
/// Each `EntityKind` accepts only its own subset, see [`EntityKind::states`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "PENDING",
            ModerationStatus::Approved => "APPROVED",
            ModerationStatus::Rejected => "REJECTED",
            ModerationStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(ModerationStatus::Pending),
            "APPROVED" => Ok(ModerationStatus::Approved),
            "REJECTED" => Ok(ModerationStatus::Rejected),
            "COMPLETED" => Ok(ModerationStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid status: {}", s)),
        }
    }
}

/// Approval status of posts, comments, applications and contact requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub const STATES: [ModerationStatus; 3] = [
        ModerationStatus::Pending,
        ModerationStatus::Approved,
        ModerationStatus::Rejected,
    ];
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl From<ApprovalStatus> for ModerationStatus {
    fn from(status: ApprovalStatus) -> Self {
        match status {
            ApprovalStatus::Pending => ModerationStatus::Pending,
            ApprovalStatus::Approved => ModerationStatus::Approved,
            ApprovalStatus::Rejected => ModerationStatus::Rejected,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ModerationStatus::from(*self).fmt(f)
    }
}

impl FromStr for ApprovalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<ModerationStatus>()? {
            ModerationStatus::Pending => Ok(Self::Pending),
            ModerationStatus::Approved => Ok(Self::Approved),
            ModerationStatus::Rejected => Ok(Self::Rejected),
            ModerationStatus::Completed => {
                Err(anyhow::anyhow!("Invalid approval status: {}", s))
            }
        }
    }
}

/// Payment transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl TransactionStatus {
    pub const STATES: [ModerationStatus; 3] = [
        ModerationStatus::Pending,
        ModerationStatus::Completed,
        ModerationStatus::Rejected,
    ];
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl From<TransactionStatus> for ModerationStatus {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Pending => ModerationStatus::Pending,
            TransactionStatus::Completed => ModerationStatus::Completed,
            TransactionStatus::Rejected => ModerationStatus::Rejected,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ModerationStatus::from(*self).fmt(f)
    }
}

impl FromStr for TransactionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<ModerationStatus>()? {
            ModerationStatus::Pending => Ok(Self::Pending),
            ModerationStatus::Completed => Ok(Self::Completed),
            ModerationStatus::Rejected => Ok(Self::Rejected),
            ModerationStatus::Approved => {
                Err(anyhow::anyhow!("Invalid transaction status: {}", s))
            }
        }
    }
}

/// One recorded status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub actor_id: i64,
    pub actor_role: UserRole,
    pub from_status: ModerationStatus,
    pub to_status: ModerationStatus,
    pub created_at: DateTime<Utc>,
}

/// Audit trail filter
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub entity_type: Option<EntityKind>,
    pub entity_id: Option<i64>,
}

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub previous_status: ModerationStatus,
    pub status: ModerationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert_eq!("contact_request".parse::<EntityKind>().unwrap(), EntityKind::ContactRequest);
        assert!("user".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_entity_kind_serde_name() {
        assert_eq!(
            serde_json::to_string(&EntityKind::ContactRequest).unwrap(),
            "\"CONTACT_REQUEST\""
        );
    }

    #[test]
    fn test_states_per_kind() {
        assert!(EntityKind::Post.states().contains(&ModerationStatus::Approved));
        assert!(!EntityKind::Post.states().contains(&ModerationStatus::Completed));
        assert!(EntityKind::Transaction.states().contains(&ModerationStatus::Completed));
        assert!(!EntityKind::Transaction.states().contains(&ModerationStatus::Approved));
    }

    #[test]
    fn test_approval_status_rejects_transaction_only_value() {
        assert_eq!("pending".parse::<ApprovalStatus>().unwrap(), ApprovalStatus::Pending);
        assert!("COMPLETED".parse::<ApprovalStatus>().is_err());
        assert!("APPROVED".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_status_display_is_uppercase() {
        assert_eq!(ApprovalStatus::Rejected.to_string(), "REJECTED");
        assert_eq!(TransactionStatus::Completed.to_string(), "COMPLETED");
    }
}
