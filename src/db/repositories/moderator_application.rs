//! Moderator application repository
//!
//! Applications are listing-only for admins; the review decision happens
//! outside this core.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    ApprovalStatus, CreateModeratorApplicationInput, ModeratorApplication,
    ModeratorApplicationWithApplicant, UserSummary,
};

#[async_trait]
pub trait ModeratorApplicationRepository: Send + Sync {
    /// File a new application in PENDING
    async fn create(&self, input: &CreateModeratorApplicationInput) -> Result<ModeratorApplication>;

    /// List applications newest first, optionally with one status
    async fn list(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ModeratorApplicationWithApplicant>>;
}

pub struct SqlxModeratorApplicationRepository {
    pool: DynDatabasePool,
}

impl SqlxModeratorApplicationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ModeratorApplicationRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_APPLICATION: &str = "INSERT INTO moderator_applications (applicant_id, motivation, status, created_at) \
                                  VALUES (?, ?, ?, ?)";

fn select_with_applicant(filtered: bool) -> String {
    format!(
        r#"
        SELECT a.id, a.applicant_id, a.motivation, a.status, a.created_at,
               u.username AS applicant_username, u.email AS applicant_email
        FROM moderator_applications a
        JOIN users u ON u.id = a.applicant_id
        {}
        ORDER BY a.created_at DESC, a.id DESC
        "#,
        if filtered { "WHERE a.status = ?" } else { "" }
    )
}

macro_rules! row_to_application {
    ($row:expr) => {{
        let row = $row;
        let status: String = row.get("status");
        let application = ModeratorApplication {
            id: row.get("id"),
            applicant_id: row.get("applicant_id"),
            motivation: row.get("motivation"),
            status: ApprovalStatus::from_str(&status)
                .with_context(|| format!("Invalid application status in database: {}", status))?,
            created_at: row.get("created_at"),
        };
        Ok::<_, anyhow::Error>(ModeratorApplicationWithApplicant {
            applicant: UserSummary {
                id: application.applicant_id,
                username: row.get("applicant_username"),
                email: row.get("applicant_email"),
            },
            application,
        })
    }};
}

#[async_trait]
impl ModeratorApplicationRepository for SqlxModeratorApplicationRepository {
    async fn create(&self, input: &CreateModeratorApplicationInput) -> Result<ModeratorApplication> {
        let now = Utc::now();
        let status = ApprovalStatus::Pending;

        let id = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(INSERT_APPLICATION)
                .bind(input.applicant_id)
                .bind(&input.motivation)
                .bind(status.to_string())
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create moderator application")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(INSERT_APPLICATION)
                .bind(input.applicant_id)
                .bind(&input.motivation)
                .bind(status.to_string())
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create moderator application")?
                .last_insert_id() as i64,
        };

        Ok(ModeratorApplication {
            id,
            applicant_id: input.applicant_id,
            motivation: input.motivation.clone(),
            status,
            created_at: now,
        })
    }

    async fn list(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ModeratorApplicationWithApplicant>> {
        let sql = select_with_applicant(status.is_some());
        let status = status.map(|s| s.to_string());

        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(pool)
                    .await
                    .context("Failed to list moderator applications")?;
                rows.iter().map(|row| row_to_application!(row)).collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(pool)
                    .await
                    .context("Failed to list moderator applications")?;
                rows.iter().map(|row| row_to_application!(row)).collect()
            }
        }
    }
}
