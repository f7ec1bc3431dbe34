//! Notification mark repository
//!
//! A mark records that an entity was notified about within one pending
//! window. The primary key on (entity_type, entity_id, window_key) makes
//! claiming atomic: the insert either lands or is ignored.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::EntityKind;

#[async_trait]
pub trait NotificationMarkRepository: Send + Sync {
    /// Claim the mark. Returns false if it was already held.
    async fn claim(&self, kind: EntityKind, id: i64, window_key: &str) -> Result<bool>;

    /// Release a claimed mark so a later run can retry
    async fn release(&self, kind: EntityKind, id: i64, window_key: &str) -> Result<()>;
}

pub struct SqlxNotificationMarkRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationMarkRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationMarkRepository> {
        Arc::new(Self::new(pool))
    }
}

const CLAIM_SQLITE: &str = "INSERT OR IGNORE INTO notification_marks \
                            (entity_type, entity_id, window_key, created_at) VALUES (?, ?, ?, ?)";
const CLAIM_MYSQL: &str = "INSERT IGNORE INTO notification_marks \
                           (entity_type, entity_id, window_key, created_at) VALUES (?, ?, ?, ?)";
const RELEASE: &str =
    "DELETE FROM notification_marks WHERE entity_type = ? AND entity_id = ? AND window_key = ?";

#[async_trait]
impl NotificationMarkRepository for SqlxNotificationMarkRepository {
    async fn claim(&self, kind: EntityKind, id: i64, window_key: &str) -> Result<bool> {
        let now = Utc::now();
        let inserted = match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(CLAIM_SQLITE)
                .bind(kind.as_str())
                .bind(id)
                .bind(window_key)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(CLAIM_MYSQL)
                .bind(kind.as_str())
                .bind(id)
                .bind(window_key)
                .bind(now)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to claim notification mark for {} {}", kind, id))?;

        Ok(inserted == 1)
    }

    async fn release(&self, kind: EntityKind, id: i64, window_key: &str) -> Result<()> {
        match self.pool.backend()? {
            Backend::Sqlite(pool) => sqlx::query(RELEASE)
                .bind(kind.as_str())
                .bind(id)
                .bind(window_key)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(RELEASE)
                .bind(kind.as_str())
                .bind(id)
                .bind(window_key)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .with_context(|| format!("Failed to release notification mark for {} {}", kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxNotificationMarkRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxNotificationMarkRepository::new(pool)
    }

    #[tokio::test]
    async fn test_claim_is_at_most_once_per_window() {
        let repo = setup().await;

        assert!(repo.claim(EntityKind::Transaction, 1, "w1").await.unwrap());
        assert!(!repo.claim(EntityKind::Transaction, 1, "w1").await.unwrap());
        assert!(repo.claim(EntityKind::Transaction, 1, "w2").await.unwrap());
        assert!(repo.claim(EntityKind::Post, 1, "w1").await.unwrap());
    }

    #[tokio::test]
    async fn test_release_allows_reclaim() {
        let repo = setup().await;

        assert!(repo.claim(EntityKind::Transaction, 7, "w").await.unwrap());
        repo.release(EntityKind::Transaction, 7, "w").await.unwrap();
        assert!(repo.claim(EntityKind::Transaction, 7, "w").await.unwrap());
    }
}
