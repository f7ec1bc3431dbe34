//! Post repository
//!
//! Database operations for posts. Listings join the creator so moderators
//! see who submitted what.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ApprovalStatus, CreatePostInput, Post, PostWithCreator, UserSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post in PENDING
    async fn create(&self, input: &CreatePostInput) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// List posts newest first, optionally with one approval status
    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<PostWithCreator>>;

    /// List posts that are not APPROVED, newest first
    async fn list_unapproved(&self) -> Result<Vec<PostWithCreator>>;

    /// Delete a post and its comments. Returns false if it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

fn select_with_creator(condition: &str) -> String {
    format!(
        r#"
        SELECT p.id, p.creator_id, p.content, p.approval_status, p.created_at, p.updated_at,
               u.username AS creator_username, u.email AS creator_email
        FROM posts p
        JOIN users u ON u.id = p.creator_id
        {}
        ORDER BY p.created_at DESC, p.id DESC
        "#,
        condition
    )
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, input: &CreatePostInput) -> Result<Post> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => create_post_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_post_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = "SELECT id, creator_id, content, approval_status, created_at, updated_at \
                   FROM posts WHERE id = ?";
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get post by ID")?;
                row.as_ref().map(row_to_post_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get post by ID")?;
                row.as_ref().map(row_to_post_mysql).transpose()
            }
        }
    }

    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<PostWithCreator>> {
        match status {
            Some(status) => {
                let sql = select_with_creator("WHERE p.approval_status = ?");
                self.fetch_with_creator(&sql, Some(status)).await
            }
            None => self.fetch_with_creator(&select_with_creator(""), None).await,
        }
    }

    async fn list_unapproved(&self) -> Result<Vec<PostWithCreator>> {
        let sql = select_with_creator("WHERE p.approval_status <> ?");
        self.fetch_with_creator(&sql, Some(ApprovalStatus::Approved)).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete post")?;

        Ok(affected > 0)
    }
}

impl SqlxPostRepository {
    async fn fetch_with_creator(
        &self,
        sql: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<PostWithCreator>> {
        let status = status.map(|s| s.to_string());
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list posts")?;
                rows.iter().map(row_to_post_with_creator_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list posts")?;
                rows.iter().map(row_to_post_with_creator_mysql).collect()
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, input: &CreatePostInput) -> Result<Post> {
    let now = Utc::now();
    let status = ApprovalStatus::Pending;

    let result = sqlx::query(
        r#"
        INSERT INTO posts (creator_id, content, approval_status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.creator_id)
    .bind(&input.content)
    .bind(status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        creator_id: input.creator_id,
        content: input.content.clone(),
        approval_status: status,
        created_at: now,
        updated_at: now,
    })
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status: String = row.get("approval_status");
    Ok(Post {
        id: row.get("id"),
        creator_id: row.get("creator_id"),
        content: row.get("content"),
        approval_status: ApprovalStatus::from_str(&status)
            .with_context(|| format!("Invalid approval status in database: {}", status))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_post_with_creator_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PostWithCreator> {
    let post = row_to_post_sqlite(row)?;
    Ok(PostWithCreator {
        creator: UserSummary {
            id: post.creator_id,
            username: row.get("creator_username"),
            email: row.get("creator_email"),
        },
        post,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, input: &CreatePostInput) -> Result<Post> {
    let now = Utc::now();
    let status = ApprovalStatus::Pending;

    let result = sqlx::query(
        r#"
        INSERT INTO posts (creator_id, content, approval_status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.creator_id)
    .bind(&input.content)
    .bind(status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        creator_id: input.creator_id,
        content: input.content.clone(),
        approval_status: status,
        created_at: now,
        updated_at: now,
    })
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let status: String = row.get("approval_status");
    Ok(Post {
        id: row.get("id"),
        creator_id: row.get("creator_id"),
        content: row.get("content"),
        approval_status: ApprovalStatus::from_str(&status)
            .with_context(|| format!("Invalid approval status in database: {}", status))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_post_with_creator_mysql(row: &sqlx::mysql::MySqlRow) -> Result<PostWithCreator> {
    let post = row_to_post_mysql(row)?;
    Ok(PostWithCreator {
        creator: UserSummary {
            id: post.creator_id,
            username: row.get("creator_username"),
            email: row.get("creator_email"),
        },
        post,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateUserInput, UserRole};

    async fn setup() -> (DynDatabasePool, SqlxPostRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&CreateUserInput::new("creator", "creator@example.com", UserRole::User))
            .await
            .unwrap();
        (pool.clone(), SqlxPostRepository::new(pool), user.id)
    }

    async fn set_status(pool: &DynDatabasePool, id: i64, status: &str) {
        sqlx::query("UPDATE posts SET approval_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_post_starts_pending() {
        let (_pool, repo, creator_id) = setup().await;
        let post = repo
            .create(&CreatePostInput { creator_id, content: "hello".to_string() })
            .await
            .unwrap();

        assert!(post.id > 0);
        assert_eq!(post.approval_status, ApprovalStatus::Pending);

        let found = repo.get_by_id(post.id).await.unwrap().expect("post exists");
        assert_eq!(found.content, "hello");
    }

    #[tokio::test]
    async fn test_list_unapproved_excludes_approved() {
        let (pool, repo, creator_id) = setup().await;
        let mut ids = Vec::new();
        for content in ["a", "b", "c"] {
            let post = repo
                .create(&CreatePostInput { creator_id, content: content.to_string() })
                .await
                .unwrap();
            ids.push(post.id);
        }
        set_status(&pool, ids[0], "APPROVED").await;
        set_status(&pool, ids[1], "REJECTED").await;

        let listed = repo.list_unapproved().await.unwrap();
        let listed_ids: Vec<i64> = listed.iter().map(|p| p.post.id).collect();
        assert_eq!(listed_ids, vec![ids[2], ids[1]]);
        assert_eq!(listed[0].creator.username, "creator");
    }

    #[tokio::test]
    async fn test_list_with_status_filter() {
        let (pool, repo, creator_id) = setup().await;
        let a = repo
            .create(&CreatePostInput { creator_id, content: "a".to_string() })
            .await
            .unwrap();
        repo.create(&CreatePostInput { creator_id, content: "b".to_string() })
            .await
            .unwrap();
        set_status(&pool, a.id, "APPROVED").await;

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        let approved = repo.list(Some(ApprovalStatus::Approved)).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].post.id, a.id);
    }

    #[tokio::test]
    async fn test_delete_post() {
        let (_pool, repo, creator_id) = setup().await;
        let post = repo
            .create(&CreatePostInput { creator_id, content: "x".to_string() })
            .await
            .unwrap();

        assert!(repo.delete(post.id).await.unwrap());
        assert!(!repo.delete(post.id).await.unwrap());
        assert!(repo.get_by_id(post.id).await.unwrap().is_none());
    }
}
