//! Transaction repository
//!
//! Rows are written by the payment integration. Here they are listed for
//! admins; status changes go through the moderation repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    CreateTransactionInput, Transaction, TransactionKind, TransactionStatus, TransactionWithUser,
    UserSummary,
};

/// Transaction repository trait
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Record a transaction in PENDING
    async fn create(&self, input: &CreateTransactionInput) -> Result<Transaction>;

    /// Get transaction by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Transaction>>;

    /// List transactions newest first with their owner, optionally with one status
    async fn list(&self, status: Option<TransactionStatus>) -> Result<Vec<TransactionWithUser>>;
}

/// SQLx-based transaction repository implementation
pub struct SqlxTransactionRepository {
    pool: DynDatabasePool,
}

impl SqlxTransactionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TransactionRepository> {
        Arc::new(Self::new(pool))
    }
}

const TRANSACTION_COLUMNS: &str =
    "t.id, t.user_id, t.kind, t.amount_cents, t.currency, t.status, t.created_at, t.updated_at";

fn select_with_user(filtered: bool) -> String {
    format!(
        r#"
        SELECT {}, u.username AS owner_username, u.email AS owner_email
        FROM transactions t
        JOIN users u ON u.id = t.user_id
        {}
        ORDER BY t.created_at DESC, t.id DESC
        "#,
        TRANSACTION_COLUMNS,
        if filtered { "WHERE t.status = ?" } else { "" }
    )
}

#[async_trait]
impl TransactionRepository for SqlxTransactionRepository {
    async fn create(&self, input: &CreateTransactionInput) -> Result<Transaction> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => create_transaction_sqlite(pool, input).await,
            Backend::Mysql(pool) => create_transaction_mysql(pool, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Transaction>> {
        let sql = format!("SELECT {} FROM transactions t WHERE t.id = ?", TRANSACTION_COLUMNS);
        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get transaction by ID")?;
                row.as_ref().map(row_to_transaction_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get transaction by ID")?;
                row.as_ref().map(row_to_transaction_mysql).transpose()
            }
        }
    }

    async fn list(&self, status: Option<TransactionStatus>) -> Result<Vec<TransactionWithUser>> {
        let sql = select_with_user(status.is_some());
        let status = status.map(|s| s.to_string());

        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list transactions")?;
                rows.iter()
                    .map(|row| {
                        let transaction = row_to_transaction_sqlite(row)?;
                        Ok(TransactionWithUser {
                            user: UserSummary {
                                id: transaction.user_id,
                                username: row.get("owner_username"),
                                email: row.get("owner_email"),
                            },
                            transaction,
                        })
                    })
                    .collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list transactions")?;
                rows.iter()
                    .map(|row| {
                        let transaction = row_to_transaction_mysql(row)?;
                        Ok(TransactionWithUser {
                            user: UserSummary {
                                id: transaction.user_id,
                                username: row.get("owner_username"),
                                email: row.get("owner_email"),
                            },
                            transaction,
                        })
                    })
                    .collect()
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_transaction_sqlite(
    pool: &SqlitePool,
    input: &CreateTransactionInput,
) -> Result<Transaction> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (user_id, kind, amount_cents, currency, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.user_id)
    .bind(input.kind.as_str())
    .bind(input.amount_cents)
    .bind(&input.currency)
    .bind(TransactionStatus::Pending.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create transaction")?;

    Ok(new_transaction(result.last_insert_rowid(), input, now))
}

fn row_to_transaction_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: TransactionKind::from_str(&kind)
            .with_context(|| format!("Invalid transaction kind in database: {}", kind))?,
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        status: TransactionStatus::from_str(&status)
            .with_context(|| format!("Invalid transaction status in database: {}", status))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_transaction_mysql(
    pool: &MySqlPool,
    input: &CreateTransactionInput,
) -> Result<Transaction> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO transactions (user_id, kind, amount_cents, currency, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.user_id)
    .bind(input.kind.as_str())
    .bind(input.amount_cents)
    .bind(&input.currency)
    .bind(TransactionStatus::Pending.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create transaction")?;

    Ok(new_transaction(result.last_insert_id() as i64, input, now))
}

fn row_to_transaction_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Transaction> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: TransactionKind::from_str(&kind)
            .with_context(|| format!("Invalid transaction kind in database: {}", kind))?,
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        status: TransactionStatus::from_str(&status)
            .with_context(|| format!("Invalid transaction status in database: {}", status))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn new_transaction(
    id: i64,
    input: &CreateTransactionInput,
    now: chrono::DateTime<Utc>,
) -> Transaction {
    Transaction {
        id,
        user_id: input.user_id,
        kind: input.kind,
        amount_cents: input.amount_cents,
        currency: input.currency.clone(),
        status: TransactionStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}
