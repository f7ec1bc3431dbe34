//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateUserInput, UpdateUserStatusInput, User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, email, role, status, suspended_until, ban_reason, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, input: &CreateUserInput) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// List users, newest first, optionally restricted to one role
    async fn list(&self, role: Option<UserRole>) -> Result<Vec<User>>;

    /// Overwrite a user's account status.
    ///
    /// Returns `None` if the user does not exist.
    async fn update_status(&self, id: i64, input: &UpdateUserStatusInput) -> Result<Option<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => create_user_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_user_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => get_user_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_user_by_id_mysql(pool, id).await,
        }
    }

    async fn list(&self, role: Option<UserRole>) -> Result<Vec<User>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => list_users_sqlite(pool, role).await,
            Backend::Mysql(pool) => list_users_mysql(pool, role).await,
        }
    }

    async fn update_status(&self, id: i64, input: &UpdateUserStatusInput) -> Result<Option<User>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => update_status_sqlite(pool, id, input).await?,
            Backend::Mysql(pool) => update_status_mysql(pool, id, input).await?,
        }
        // MySQL reports changed rows, not matched ones, so re-read instead
        self.get_by_id(id).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, role, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(input.role.as_str())
    .bind(UserStatus::Active.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let mut user = User::new(input.username.clone(), input.email.clone(), input.role);
    user.id = result.last_insert_rowid();
    user.created_at = now;
    user.updated_at = now;
    Ok(user)
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn list_users_sqlite(pool: &SqlitePool, role: Option<UserRole>) -> Result<Vec<User>> {
    let rows = match role {
        Some(role) => {
            let sql = format!(
                "SELECT {} FROM users WHERE role = ? ORDER BY created_at DESC, id DESC",
                USER_COLUMNS
            );
            sqlx::query(&sql).bind(role.as_str()).fetch_all(pool).await
        }
        None => {
            let sql = format!("SELECT {} FROM users ORDER BY created_at DESC, id DESC", USER_COLUMNS);
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

async fn update_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &UpdateUserStatusInput,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET status = ?, suspended_until = ?, ban_reason = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(input.status.as_str())
    .bind(input.suspended_until)
    .bind(&input.reason)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user status")?;

    Ok(())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let status_str: String = row.get("status");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: UserRole::from_str(&role_str)
            .with_context(|| format!("Invalid role in database: {}", role_str))?,
        status: UserStatus::from_str(&status_str)
            .with_context(|| format!("Invalid status in database: {}", status_str))?,
        suspended_until: row.get("suspended_until"),
        ban_reason: row.get("ban_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, input: &CreateUserInput) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, role, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(input.role.as_str())
    .bind(UserStatus::Active.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    let mut user = User::new(input.username.clone(), input.email.clone(), input.role);
    user.id = result.last_insert_id() as i64;
    user.created_at = now;
    user.updated_at = now;
    Ok(user)
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn list_users_mysql(pool: &MySqlPool, role: Option<UserRole>) -> Result<Vec<User>> {
    let rows = match role {
        Some(role) => {
            let sql = format!(
                "SELECT {} FROM users WHERE role = ? ORDER BY created_at DESC, id DESC",
                USER_COLUMNS
            );
            sqlx::query(&sql).bind(role.as_str()).fetch_all(pool).await
        }
        None => {
            let sql = format!("SELECT {} FROM users ORDER BY created_at DESC, id DESC", USER_COLUMNS);
            sqlx::query(&sql).fetch_all(pool).await
        }
    }
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

async fn update_status_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &UpdateUserStatusInput,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET status = ?, suspended_until = ?, ban_reason = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(input.status.as_str())
    .bind(input.suspended_until)
    .bind(&input.reason)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update user status")?;

    Ok(())
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role_str: String = row.get("role");
    let status_str: String = row.get("status");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        role: UserRole::from_str(&role_str)
            .with_context(|| format!("Invalid role in database: {}", role_str))?,
        status: UserStatus::from_str(&status_str)
            .with_context(|| format!("Invalid status in database: {}", status_str))?,
        suspended_until: row.get("suspended_until"),
        ban_reason: row.get("ban_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
