//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ApprovalStatus, Comment, CommentWithAuthor, CreateCommentInput, UserSummary};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment in PENDING
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment>;

    /// Get a comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// All comments, newest first, optionally with one approval status
    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<CommentWithAuthor>>;

    /// Comments awaiting or refused approval
    async fn list_unapproved(&self) -> Result<Vec<CommentWithAuthor>>;

    /// Delete a comment
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Comment repository implementation
pub struct CommentRepositoryImpl {
    pool: DynDatabasePool,
}

impl CommentRepositoryImpl {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_BY_ID: &str = "SELECT id, post_id, user_id, content, approval_status, created_at, updated_at \
                            FROM comments WHERE id = ?";

fn select_with_author(condition: &str) -> String {
    format!(
        r#"
        SELECT c.id, c.post_id, c.user_id, c.content, c.approval_status, c.created_at, c.updated_at,
               u.username AS author_username, u.email AS author_email
        FROM comments c
        JOIN users u ON u.id = c.user_id
        {}
        ORDER BY c.created_at DESC, c.id DESC
        "#,
        condition
    )
}

#[async_trait]
impl CommentRepository for CommentRepositoryImpl {
    async fn create(&self, input: &CreateCommentInput) -> Result<Comment> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => create_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(SELECT_BY_ID).bind(id).fetch_optional(pool).await?;
                row.as_ref().map(row_to_comment_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(SELECT_BY_ID).bind(id).fetch_optional(pool).await?;
                row.as_ref().map(row_to_comment_mysql).transpose()
            }
        }
    }

    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<CommentWithAuthor>> {
        match status {
            Some(status) => {
                let sql = select_with_author("WHERE c.approval_status = ?");
                self.fetch_with_author(&sql, Some(status)).await
            }
            None => self.fetch_with_author(&select_with_author(""), None).await,
        }
    }

    async fn list_unapproved(&self) -> Result<Vec<CommentWithAuthor>> {
        let sql = select_with_author("WHERE c.approval_status <> ?");
        self.fetch_with_author(&sql, Some(ApprovalStatus::Approved)).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

impl CommentRepositoryImpl {
    async fn fetch_with_author(
        &self,
        sql: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<CommentWithAuthor>> {
        let status = status.map(|s| s.to_string());
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list comments")?;
                rows.iter().map(row_to_comment_with_author_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list comments")?;
                rows.iter().map(row_to_comment_with_author_mysql).collect()
            }
        }
    }
}

// SQLite

async fn create_sqlite(pool: &SqlitePool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let status = ApprovalStatus::Pending;
    let result = sqlx::query(
        "INSERT INTO comments (post_id, user_id, content, approval_status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.post_id)
    .bind(input.user_id)
    .bind(&input.content)
    .bind(status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id: input.post_id,
        user_id: input.user_id,
        content: input.content.clone(),
        approval_status: status,
        created_at: now,
        updated_at: now,
    })
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    let status: String = row.get("approval_status");
    Ok(Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        approval_status: ApprovalStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_comment_with_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CommentWithAuthor> {
    let comment = row_to_comment_sqlite(row)?;
    Ok(CommentWithAuthor {
        user: UserSummary {
            id: comment.user_id,
            username: row.get("author_username"),
            email: row.get("author_email"),
        },
        comment,
    })
}

// MySQL

async fn create_mysql(pool: &MySqlPool, input: &CreateCommentInput) -> Result<Comment> {
    let now = Utc::now();
    let status = ApprovalStatus::Pending;
    let result = sqlx::query(
        "INSERT INTO comments (post_id, user_id, content, approval_status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.post_id)
    .bind(input.user_id)
    .bind(&input.content)
    .bind(status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        post_id: input.post_id,
        user_id: input.user_id,
        content: input.content.clone(),
        approval_status: status,
        created_at: now,
        updated_at: now,
    })
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Comment> {
    let status: String = row.get("approval_status");
    Ok(Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        approval_status: ApprovalStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_comment_with_author_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CommentWithAuthor> {
    let comment = row_to_comment_mysql(row)?;
    Ok(CommentWithAuthor {
        user: UserSummary {
            id: comment.user_id,
            username: row.get("author_username"),
            email: row.get("author_email"),
        },
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{PostRepository, SqlxPostRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreatePostInput, CreateUserInput, UserRole};

    struct Fixture {
        comments: CommentRepositoryImpl,
        posts: SqlxPostRepository,
        post_id: i64,
        user_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let user = SqlxUserRepository::new(pool.clone())
            .create(&CreateUserInput::new("author", "author@example.com", UserRole::User))
            .await
            .unwrap();
        let posts = SqlxPostRepository::new(pool.clone());
        let post = posts
            .create(&CreatePostInput { creator_id: user.id, content: "post".into() })
            .await
            .unwrap();
        Fixture {
            comments: CommentRepositoryImpl::new(pool),
            posts,
            post_id: post.id,
            user_id: user.id,
        }
    }

    fn input(f: &Fixture, content: &str) -> CreateCommentInput {
        CreateCommentInput {
            post_id: f.post_id,
            user_id: f.user_id,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_unapproved() {
        let f = setup().await;
        let first = f.comments.create(&input(&f, "first")).await.unwrap();
        let second = f.comments.create(&input(&f, "second")).await.unwrap();
        assert_eq!(first.approval_status, ApprovalStatus::Pending);

        let listed = f.comments.list_unapproved().await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|c| c.comment.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(listed[0].user.username, "author");
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let f = setup().await;
        f.comments.create(&input(&f, "x")).await.unwrap();

        assert_eq!(f.comments.list(Some(ApprovalStatus::Pending)).await.unwrap().len(), 1);
        assert!(f.comments.list(Some(ApprovalStatus::Rejected)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_comment() {
        let f = setup().await;
        let comment = f.comments.create(&input(&f, "bye")).await.unwrap();

        assert!(f.comments.delete(comment.id).await.unwrap());
        assert!(!f.comments.delete(comment.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_comments_cascade_with_post() {
        let f = setup().await;
        let comment = f.comments.create(&input(&f, "orphan")).await.unwrap();

        assert!(f.posts.delete(f.post_id).await.unwrap());
        assert!(f.comments.get_by_id(comment.id).await.unwrap().is_none());
    }
}
