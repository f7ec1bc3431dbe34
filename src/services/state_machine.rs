//! Approval state machine
//!
//! Which target statuses an actor may set is a pure function of
//! (actor role, entity kind), looked up in [`TRANSITION_RULES`]. A pair with
//! no rule allows nothing. The current status never matters: any permitted
//! target may be set from any state, including the one already held.

use crate::models::{EntityKind, ModerationStatus, UserRole};

use ModerationStatus::{Approved, Completed, Pending, Rejected};

/// One row of the transition table
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub role: UserRole,
    pub kind: EntityKind,
    pub targets: &'static [ModerationStatus],
}

/// Targets each role may set per entity kind.
///
/// Moderators can hide or re-queue user content but only admins approve it.
pub const TRANSITION_RULES: &[TransitionRule] = &[
    TransitionRule { role: UserRole::Moderator, kind: EntityKind::Post, targets: &[Pending, Rejected] },
    TransitionRule { role: UserRole::Moderator, kind: EntityKind::Comment, targets: &[Pending, Rejected] },
    TransitionRule { role: UserRole::Admin, kind: EntityKind::Post, targets: &[Pending, Approved, Rejected] },
    TransitionRule { role: UserRole::Admin, kind: EntityKind::Comment, targets: &[Pending, Approved, Rejected] },
    TransitionRule {
        role: UserRole::Admin,
        kind: EntityKind::ContactRequest,
        targets: &[Pending, Approved, Rejected],
    },
    TransitionRule {
        role: UserRole::Admin,
        kind: EntityKind::Transaction,
        targets: &[Pending, Completed, Rejected],
    },
];

/// Why a requested target was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Not a status this kind of entity can hold
    #[error("'{raw}' is not a valid status for {kind}")]
    UnknownStatus { kind: EntityKind, raw: String },

    /// A real status, but outside what this role may set
    #[error("{role} may not set {kind} to {target}")]
    NotPermitted {
        role: UserRole,
        kind: EntityKind,
        target: ModerationStatus,
    },
}

/// Targets `role` may set on `kind`; empty when there is no rule
pub fn allowed_targets(role: UserRole, kind: EntityKind) -> &'static [ModerationStatus] {
    TRANSITION_RULES
        .iter()
        .find(|rule| rule.role == role && rule.kind == kind)
        .map(|rule| rule.targets)
        .unwrap_or(&[])
}

/// Parse a raw target and check it against the table.
///
/// Parsing ignores case and surrounding whitespace; the result is the
/// canonical upper-case status.
pub fn validate_target(
    role: UserRole,
    kind: EntityKind,
    raw: &str,
) -> Result<ModerationStatus, TransitionError> {
    let target = raw
        .parse::<ModerationStatus>()
        .ok()
        .filter(|status| kind.states().contains(status))
        .ok_or_else(|| TransitionError::UnknownStatus {
            kind,
            raw: raw.to_string(),
        })?;

    if !allowed_targets(role, kind).contains(&target) {
        return Err(TransitionError::NotPermitted { role, kind, target });
    }

    Ok(target)
}
