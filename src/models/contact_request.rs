//! Contact request model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApprovalStatus;

/// Message sent through the public contact form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRequest {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a contact request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContactRequestInput {
    pub name: String,
    pub email: String,
    pub message: String,
}
