//! Moderation repository
//!
//! Status reads and writes shared by every moderated entity kind. Table and
//! column names come from [`EntityKind`], never from request input.
//!
//! A transition is one database transaction: the status column and
//! `updated_at` are overwritten and an audit row is appended. Either both
//! land or neither does.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    AuditEntry, AuditFilter, EntityKind, ModerationStatus, PendingItem, TransitionOutcome, User,
    UserRole,
};

/// Moderation repository trait
#[async_trait]
pub trait ModerationRepository: Send + Sync {
    /// Current status of an entity, `None` if it does not exist
    async fn current_status(&self, kind: EntityKind, id: i64) -> Result<Option<ModerationStatus>>;

    /// Overwrite an entity's status and append the audit entry.
    ///
    /// Returns `None` without writing if the entity does not exist. The
    /// target is not checked here; callers validate it first.
    async fn apply_transition(
        &self,
        kind: EntityKind,
        id: i64,
        actor: &User,
        to: ModerationStatus,
    ) -> Result<Option<TransitionOutcome>>;

    /// Audit entries newest first
    async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>>;

    /// Entities of `kind` in PENDING whose last change is before `older_than`
    async fn list_stale_pending(
        &self,
        kind: EntityKind,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PendingItem>>;
}

/// SQLx-based moderation repository implementation
pub struct SqlxModerationRepository {
    pool: DynDatabasePool,
}

impl SqlxModerationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ModerationRepository> {
        Arc::new(Self::new(pool))
    }
}

fn select_status_sql(kind: EntityKind, for_update: bool) -> String {
    format!(
        "SELECT {} AS status FROM {} WHERE id = ?{}",
        kind.status_column(),
        kind.table(),
        if for_update { " FOR UPDATE" } else { "" }
    )
}

fn update_status_sql(kind: EntityKind) -> String {
    format!(
        "UPDATE {} SET {} = ?, updated_at = ? WHERE id = ?",
        kind.table(),
        kind.status_column()
    )
}

const INSERT_AUDIT: &str = r#"
    INSERT INTO moderation_audit
        (entity_type, entity_id, actor_id, actor_role, from_status, to_status, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

/// Owner id expression, owner email expression and join clause per kind
fn owner_source(kind: EntityKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        EntityKind::Post => ("e.creator_id", "u.email", "LEFT JOIN users u ON u.id = e.creator_id"),
        EntityKind::Comment | EntityKind::Transaction => {
            ("e.user_id", "u.email", "LEFT JOIN users u ON u.id = e.user_id")
        }
        EntityKind::ContactRequest => ("NULL", "e.email", ""),
    }
}

fn stale_pending_sql(kind: EntityKind) -> String {
    let (owner_id, owner_email, join) = owner_source(kind);
    format!(
        r#"
        SELECT e.id, {} AS owner_id, {} AS owner_email, e.updated_at
        FROM {} e
        {}
        WHERE e.{} = ? AND e.updated_at < ?
        ORDER BY e.updated_at ASC, e.id ASC
        "#,
        owner_id,
        owner_email,
        kind.table(),
        join,
        kind.status_column()
    )
}

fn audit_sql(filter: &AuditFilter) -> String {
    let mut conditions = Vec::new();
    if filter.entity_type.is_some() {
        conditions.push("entity_type = ?");
    }
    if filter.entity_id.is_some() {
        conditions.push("entity_id = ?");
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    format!(
        "SELECT id, entity_type, entity_id, actor_id, actor_role, from_status, to_status, created_at \
         FROM moderation_audit {} ORDER BY created_at DESC, id DESC",
        where_clause
    )
}

fn parse_status(raw: &str) -> Result<ModerationStatus> {
    ModerationStatus::from_str(raw).with_context(|| format!("Invalid status in database: {}", raw))
}

#[async_trait]
impl ModerationRepository for SqlxModerationRepository {
    async fn current_status(&self, kind: EntityKind, id: i64) -> Result<Option<ModerationStatus>> {
        let sql = select_status_sql(kind, false);
        let raw: Option<String> = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map(|row| row.map(|r| r.get("status"))),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map(|row| row.map(|r| r.get("status"))),
        }
        .with_context(|| format!("Failed to read status of {} {}", kind, id))?;

        raw.as_deref().map(parse_status).transpose()
    }

    async fn apply_transition(
        &self,
        kind: EntityKind,
        id: i64,
        actor: &User,
        to: ModerationStatus,
    ) -> Result<Option<TransitionOutcome>> {
        let outcome = match self.pool.backend()? {
            Backend::Sqlite(pool) => apply_transition_sqlite(pool, kind, id, actor, to).await,
            Backend::Mysql(pool) => apply_transition_mysql(pool, kind, id, actor, to).await,
        }
        .with_context(|| format!("Failed to transition {} {} to {}", kind, id, to))?;

        if let Some(outcome) = &outcome {
            tracing::info!(
                entity_type = %kind,
                entity_id = id,
                actor_id = actor.id,
                from = %outcome.previous_status,
                to = %outcome.status,
                "Status transition applied"
            );
        }
        Ok(outcome)
    }

    async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let sql = audit_sql(filter);
        let entity_type = filter.entity_type.map(|k| k.as_str());

        match self.pool.backend()? {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                if let Some(entity_type) = entity_type {
                    query = query.bind(entity_type);
                }
                if let Some(entity_id) = filter.entity_id {
                    query = query.bind(entity_id);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list audit trail")?;
                rows.iter().map(row_to_audit_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql);
                if let Some(entity_type) = entity_type {
                    query = query.bind(entity_type);
                }
                if let Some(entity_id) = filter.entity_id {
                    query = query.bind(entity_id);
                }
                let rows = query.fetch_all(pool).await.context("Failed to list audit trail")?;
                rows.iter().map(row_to_audit_mysql).collect()
            }
        }
    }

    async fn list_stale_pending(
        &self,
        kind: EntityKind,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<PendingItem>> {
        let sql = stale_pending_sql(kind);
        let pending = ModerationStatus::Pending.as_str();

        let items = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(pending)
                .bind(older_than)
                .fetch_all(pool)
                .await
                .map(|rows| {
                    rows.iter()
                        .map(|row| PendingItem {
                            kind,
                            id: row.get("id"),
                            user_id: row.get("owner_id"),
                            email: row.get("owner_email"),
                            pending_since: row.get("updated_at"),
                        })
                        .collect::<Vec<_>>()
                }),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(pending)
                .bind(older_than)
                .fetch_all(pool)
                .await
                .map(|rows| {
                    rows.iter()
                        .map(|row| PendingItem {
                            kind,
                            id: row.get("id"),
                            user_id: row.get("owner_id"),
                            email: row.get("owner_email"),
                            pending_since: row.get("updated_at"),
                        })
                        .collect::<Vec<_>>()
                }),
        }
        .with_context(|| format!("Failed to scan pending {} rows", kind))?;

        Ok(items)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn apply_transition_sqlite(
    pool: &SqlitePool,
    kind: EntityKind,
    id: i64,
    actor: &User,
    to: ModerationStatus,
) -> Result<Option<TransitionOutcome>> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&select_status_sql(kind, false))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let from = parse_status(&row.get::<String, _>("status"))?;
    let now = Utc::now();

    sqlx::query(&update_status_sql(kind))
        .bind(to.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(INSERT_AUDIT)
        .bind(kind.as_str())
        .bind(id)
        .bind(actor.id)
        .bind(actor.role.as_str())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(TransitionOutcome {
        entity_type: kind,
        entity_id: id,
        previous_status: from,
        status: to,
    }))
}

fn row_to_audit_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AuditEntry> {
    let entity_type: String = row.get("entity_type");
    let actor_role: String = row.get("actor_role");
    Ok(AuditEntry {
        id: row.get("id"),
        entity_type: EntityKind::from_str(&entity_type)?,
        entity_id: row.get("entity_id"),
        actor_id: row.get("actor_id"),
        actor_role: UserRole::from_str(&actor_role)?,
        from_status: parse_status(&row.get::<String, _>("from_status"))?,
        to_status: parse_status(&row.get::<String, _>("to_status"))?,
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn apply_transition_mysql(
    pool: &MySqlPool,
    kind: EntityKind,
    id: i64,
    actor: &User,
    to: ModerationStatus,
) -> Result<Option<TransitionOutcome>> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&select_status_sql(kind, true))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let from = parse_status(&row.get::<String, _>("status"))?;
    let now = Utc::now();

    sqlx::query(&update_status_sql(kind))
        .bind(to.as_str())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(INSERT_AUDIT)
        .bind(kind.as_str())
        .bind(id)
        .bind(actor.id)
        .bind(actor.role.as_str())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Some(TransitionOutcome {
        entity_type: kind,
        entity_id: id,
        previous_status: from,
        status: to,
    }))
}

fn row_to_audit_mysql(row: &sqlx::mysql::MySqlRow) -> Result<AuditEntry> {
    let entity_type: String = row.get("entity_type");
    let actor_role: String = row.get("actor_role");
    Ok(AuditEntry {
        id: row.get("id"),
        entity_type: EntityKind::from_str(&entity_type)?,
        entity_id: row.get("entity_id"),
        actor_id: row.get("actor_id"),
        actor_role: UserRole::from_str(&actor_role)?,
        from_status: parse_status(&row.get::<String, _>("from_status"))?,
        to_status: parse_status(&row.get::<String, _>("to_status"))?,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ContactRequestRepository, PostRepository, SqlxContactRequestRepository,
        SqlxPostRepository, SqlxTransactionRepository, SqlxUserRepository, TransactionRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{
        CreateContactRequestInput, CreatePostInput, CreateTransactionInput, CreateUserInput,
        TransactionKind,
    };
    use chrono::Duration;

    struct Fixture {
        pool: DynDatabasePool,
        repo: SqlxModerationRepository,
        admin: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let admin = SqlxUserRepository::new(pool.clone())
            .create(&CreateUserInput::new("root", "root@example.com", UserRole::Admin))
            .await
            .unwrap();
        Fixture {
            repo: SqlxModerationRepository::new(pool.clone()),
            pool,
            admin,
        }
    }

    async fn backdate(pool: &DynDatabasePool, table: &str, id: i64, at: DateTime<Utc>) {
        sqlx::query(&format!("UPDATE {} SET updated_at = ? WHERE id = ?", table))
            .bind(at)
            .bind(id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_current_status() {
        let f = setup().await;
        let post = SqlxPostRepository::new(f.pool.clone())
            .create(&CreatePostInput { creator_id: f.admin.id, content: "x".into() })
            .await
            .unwrap();

        assert_eq!(
            f.repo.current_status(EntityKind::Post, post.id).await.unwrap(),
            Some(ModerationStatus::Pending)
        );
        assert_eq!(f.repo.current_status(EntityKind::Post, 9999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_apply_transition_writes_status_and_audit() {
        let f = setup().await;
        let post = SqlxPostRepository::new(f.pool.clone())
            .create(&CreatePostInput { creator_id: f.admin.id, content: "x".into() })
            .await
            .unwrap();

        let outcome = f
            .repo
            .apply_transition(EntityKind::Post, post.id, &f.admin, ModerationStatus::Approved)
            .await
            .unwrap()
            .expect("post exists");
        assert_eq!(outcome.previous_status, ModerationStatus::Pending);
        assert_eq!(outcome.status, ModerationStatus::Approved);
        assert_eq!(
            f.repo.current_status(EntityKind::Post, post.id).await.unwrap(),
            Some(ModerationStatus::Approved)
        );

        let audit = f
            .repo
            .list_audit(&AuditFilter {
                entity_type: Some(EntityKind::Post),
                entity_id: Some(post.id),
            })
            .await
            .unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].actor_id, f.admin.id);
        assert_eq!(audit[0].actor_role, UserRole::Admin);
        assert_eq!(audit[0].from_status, ModerationStatus::Pending);
        assert_eq!(audit[0].to_status, ModerationStatus::Approved);
    }

    #[tokio::test]
    async fn test_apply_transition_missing_entity_writes_nothing() {
        let f = setup().await;
        let outcome = f
            .repo
            .apply_transition(EntityKind::Comment, 404, &f.admin, ModerationStatus::Rejected)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(f.repo.list_audit(&AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_status_column() {
        let f = setup().await;
        let tx = SqlxTransactionRepository::new(f.pool.clone())
            .create(&CreateTransactionInput {
                user_id: f.admin.id,
                kind: TransactionKind::Payout,
                amount_cents: 1200,
                currency: "EUR".into(),
            })
            .await
            .unwrap();

        f.repo
            .apply_transition(EntityKind::Transaction, tx.id, &f.admin, ModerationStatus::Completed)
            .await
            .unwrap()
            .expect("transaction exists");
        assert_eq!(
            f.repo.current_status(EntityKind::Transaction, tx.id).await.unwrap(),
            Some(ModerationStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_list_stale_pending() {
        let f = setup().await;
        let transactions = SqlxTransactionRepository::new(f.pool.clone());
        let input = CreateTransactionInput {
            user_id: f.admin.id,
            kind: TransactionKind::Checkout,
            amount_cents: 999,
            currency: "USD".into(),
        };
        let old = transactions.create(&input).await.unwrap();
        let fresh = transactions.create(&input).await.unwrap();
        let done = transactions.create(&input).await.unwrap();

        let now = Utc::now();
        backdate(&f.pool, "transactions", old.id, now - Duration::hours(3)).await;
        backdate(&f.pool, "transactions", done.id, now - Duration::hours(3)).await;
        f.repo
            .apply_transition(EntityKind::Transaction, done.id, &f.admin, ModerationStatus::Completed)
            .await
            .unwrap();

        let stale = f
            .repo
            .list_stale_pending(EntityKind::Transaction, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
        assert_eq!(stale[0].user_id, Some(f.admin.id));
        assert_eq!(stale[0].email.as_deref(), Some("root@example.com"));
        assert!(stale.iter().all(|item| item.id != fresh.id));
    }

    #[tokio::test]
    async fn test_list_stale_pending_contact_request_uses_sender_email() {
        let f = setup().await;
        let request = SqlxContactRequestRepository::new(f.pool.clone())
            .create(&CreateContactRequestInput {
                name: "Cy".into(),
                email: "cy@example.com".into(),
                message: "hi".into(),
            })
            .await
            .unwrap();
        let now = Utc::now();
        backdate(&f.pool, "contact_requests", request.id, now - Duration::days(1)).await;

        let stale = f
            .repo
            .list_stale_pending(EntityKind::ContactRequest, now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].user_id, None);
        assert_eq!(stale[0].email.as_deref(), Some("cy@example.com"));
    }

    #[test]
    fn test_audit_sql_filters() {
        assert!(!audit_sql(&AuditFilter::default()).contains("WHERE"));
        let sql = audit_sql(&AuditFilter {
            entity_type: Some(EntityKind::Post),
            entity_id: Some(1),
        });
        assert!(sql.contains("WHERE entity_type = ? AND entity_id = ?"));
    }
}
