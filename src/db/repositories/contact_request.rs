//! Contact request repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ApprovalStatus, ContactRequest, CreateContactRequestInput};

#[async_trait]
pub trait ContactRequestRepository: Send + Sync {
    /// Record a contact form submission in PENDING
    async fn create(&self, input: &CreateContactRequestInput) -> Result<ContactRequest>;

    /// List requests newest first, optionally with one status
    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ContactRequest>>;
}

pub struct SqlxContactRequestRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRequestRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRequestRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_REQUEST: &str = "INSERT INTO contact_requests (name, email, message, status, created_at, updated_at) \
                              VALUES (?, ?, ?, ?, ?, ?)";
const SELECT_ALL: &str = "SELECT id, name, email, message, status, created_at, updated_at \
                          FROM contact_requests ORDER BY created_at DESC, id DESC";
const SELECT_BY_STATUS: &str = "SELECT id, name, email, message, status, created_at, updated_at \
                                FROM contact_requests WHERE status = ? ORDER BY created_at DESC, id DESC";

macro_rules! row_to_contact_request {
    ($row:expr) => {{
        let row = $row;
        let status: String = row.get("status");
        Ok::<_, anyhow::Error>(ContactRequest {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            message: row.get("message"),
            status: ApprovalStatus::from_str(&status)
                .with_context(|| format!("Invalid contact request status in database: {}", status))?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }};
}

#[async_trait]
impl ContactRequestRepository for SqlxContactRequestRepository {
    async fn create(&self, input: &CreateContactRequestInput) -> Result<ContactRequest> {
        let now = Utc::now();
        let status = ApprovalStatus::Pending;

        let id = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(INSERT_REQUEST)
                .bind(&input.name)
                .bind(&input.email)
                .bind(&input.message)
                .bind(status.to_string())
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create contact request")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(INSERT_REQUEST)
                .bind(&input.name)
                .bind(&input.email)
                .bind(&input.message)
                .bind(status.to_string())
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create contact request")?
                .last_insert_id() as i64,
        };

        Ok(ContactRequest {
            id,
            name: input.name.clone(),
            email: input.email.clone(),
            message: input.message.clone(),
            status,
            created_at: now,
            updated_at: now,
        })
    }

    async fn list(&self, status: Option<ApprovalStatus>) -> Result<Vec<ContactRequest>> {
        let status = status.map(|s| s.to_string());
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let rows = match &status {
                    Some(status) => sqlx::query(SELECT_BY_STATUS).bind(status).fetch_all(pool).await,
                    None => sqlx::query(SELECT_ALL).fetch_all(pool).await,
                }
                .context("Failed to list contact requests")?;
                rows.iter().map(|row| row_to_contact_request!(row)).collect()
            }
            Backend::Mysql(pool) => {
                let rows = match &status {
                    Some(status) => sqlx::query(SELECT_BY_STATUS).bind(status).fetch_all(pool).await,
                    None => sqlx::query(SELECT_ALL).fetch_all(pool).await,
                }
                .context("Failed to list contact requests")?;
                rows.iter().map(|row| row_to_contact_request!(row)).collect()
            }
        }
    }
}
