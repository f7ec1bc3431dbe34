//! Moderator application model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApprovalStatus, UserSummary};

/// A member's request to become a moderator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorApplication {
    pub id: i64,
    pub applicant_id: i64,
    pub motivation: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

/// Application with the applicant included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeratorApplicationWithApplicant {
    #[serde(flatten)]
    pub application: ModeratorApplication,
    pub applicant: UserSummary,
}

/// Input for filing an application
#[derive(Debug, Clone, Deserialize)]
pub struct CreateModeratorApplicationInput {
    pub applicant_id: i64,
    pub motivation: String,
}
