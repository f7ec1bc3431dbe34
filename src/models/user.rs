//! User model
//!
//! This module defines the User entity and related types. The role is the
//! sole input to the role gate; the status and suspension fields decide
//! whether a resolved user may act at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered member of the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// User role
    pub role: UserRole,
    /// Account status (active/suspended/banned)
    pub status: UserStatus,
    /// End of a temporary suspension
    pub suspended_until: Option<DateTime<Utc>>,
    /// Reason recorded when the account was suspended or banned
    pub ban_reason: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user with the given role.
    pub fn new(username: String, email: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            role,
            status: UserStatus::Active,
            suspended_until: None,
            ban_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account is barred from acting at `now`.
    ///
    /// Banned accounts are always blocked. Suspended accounts are blocked
    /// until `suspended_until`; a suspension without an end date never lifts.
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            UserStatus::Active => false,
            UserStatus::Banned => true,
            UserStatus::Suspended => self.suspended_until.map_or(true, |until| until > now),
        }
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    /// Regular member
    User,
    /// Reviews user-submitted content
    Moderator,
    /// Full access
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::User, UserRole::Moderator, UserRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Moderator => "MODERATOR",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "MODERATOR" => Ok(UserRole::Moderator),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserStatus {
    /// Normal access
    Active,
    /// Temporarily barred, see `suspended_until`
    Suspended,
    /// Permanently barred
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Suspended => "SUSPENDED",
            UserStatus::Banned => "BANNED",
        }
    }
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(UserStatus::Active),
            "SUSPENDED" => Ok(UserStatus::Suspended),
            "BANNED" => Ok(UserStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for creating a user record
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl CreateUserInput {
    pub fn new(username: impl Into<String>, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            role,
        }
    }
}

/// Input for changing an account's status
#[derive(Debug, Clone)]
pub struct UpdateUserStatusInput {
    pub status: UserStatus,
    pub suspended_until: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_with(role: UserRole) -> User {
        User::new("someone".to_string(), "someone@example.com".to_string(), role)
    }

    #[test]
    fn test_user_new_is_active() {
        let user = user_with(UserRole::User);

        assert_eq!(user.id, 0);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.suspended_until.is_none());
    }

    #[test]
    fn test_blocked_states() {
        let now = Utc::now();
        let mut user = user_with(UserRole::Moderator);
        assert!(!user.is_blocked_at(now));

        user.status = UserStatus::Banned;
        assert!(user.is_blocked_at(now));

        user.status = UserStatus::Suspended;
        user.suspended_until = Some(now + Duration::hours(1));
        assert!(user.is_blocked_at(now));

        user.suspended_until = Some(now - Duration::hours(1));
        assert!(!user.is_blocked_at(now));

        user.suspended_until = None;
        assert!(user.is_blocked_at(now));
    }

    #[test]
    fn test_user_role_display_and_parse() {
        assert_eq!(UserRole::Moderator.to_string(), "MODERATOR");
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str(" Moderator ").unwrap(), UserRole::Moderator);
        assert!(UserRole::from_str("editor").is_err());
    }

    #[test]
    fn test_user_role_serde_uses_uppercase() {
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"ADMIN\"");
        let role: UserRole = serde_json::from_str("\"MODERATOR\"").unwrap();
        assert_eq!(role, UserRole::Moderator);
    }

    #[test]
    fn test_user_status_parse() {
        assert_eq!(UserStatus::from_str("banned").unwrap(), UserStatus::Banned);
        assert!(UserStatus::from_str("deleted").is_err());
    }
}
