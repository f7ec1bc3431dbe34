//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApprovalStatus;

/// User-submitted post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub creator_id: i64,
    pub content: String,
    pub approval_status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post with its creator included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithCreator {
    #[serde(flatten)]
    pub post: Post,
    pub creator: UserSummary,
}

/// Public projection of a user embedded in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Input for creating a post
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub creator_id: i64,
    pub content: String,
}
