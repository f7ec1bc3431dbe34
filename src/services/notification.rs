//! Pending-item notification dispatcher
//!
//! Invoked by an external scheduler. Each run scans the configured entity
//! kinds for rows stuck in PENDING, claims a notification mark per pending
//! window and hands one notification per claimed row to the delivery
//! driver. One failing row never stops the batch.

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::config::NotificationConfig;
use crate::db::repositories::{ModerationRepository, NotificationMarkRepository};
use crate::models::{DispatchReport, EntityKind, Notification, PendingItem};
use crate::services::delivery::NotificationDelivery;

/// Error types for dispatcher runs
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NotificationDispatcher {
    moderation: Arc<dyn ModerationRepository>,
    marks: Arc<dyn NotificationMarkRepository>,
    delivery: Arc<dyn NotificationDelivery>,
    scan: Vec<EntityKind>,
    pending_after_minutes: i64,
}

impl NotificationDispatcher {
    pub fn new(
        moderation: Arc<dyn ModerationRepository>,
        marks: Arc<dyn NotificationMarkRepository>,
        delivery: Arc<dyn NotificationDelivery>,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            moderation,
            marks,
            delivery,
            scan: config.scan.clone(),
            pending_after_minutes: config.pending_after_minutes,
        }
    }

    /// Notify about every entity pending since before `now - pending_after_minutes`.
    ///
    /// A scan failure aborts the run. Claim and delivery failures are logged
    /// and counted; a failed delivery releases its mark so the next run
    /// retries the same window.
    pub async fn dispatch_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport, NotificationError> {
        let cutoff = Duration::try_minutes(self.pending_after_minutes)
            .and_then(|threshold| now.checked_sub_signed(threshold))
            .ok_or_else(|| {
                anyhow!(
                    "Pending threshold of {} minutes is out of range",
                    self.pending_after_minutes
                )
            })?;
        let mut report = DispatchReport::default();

        for kind in &self.scan {
            let items = self.moderation.list_stale_pending(*kind, cutoff).await?;
            report.scanned += items.len();

            for item in items {
                self.dispatch_one(&item, &mut report).await;
            }
        }

        tracing::info!(
            scanned = report.scanned,
            notified = report.notified,
            skipped = report.skipped,
            failed = report.failed,
            "Pending notification run finished"
        );
        Ok(report)
    }

    async fn dispatch_one(&self, item: &PendingItem, report: &mut DispatchReport) {
        let window = item.window_key();

        match self.marks.claim(item.kind, item.id, &window).await {
            Ok(true) => {}
            Ok(false) => {
                report.skipped += 1;
                return;
            }
            Err(e) => {
                tracing::error!(entity_type = %item.kind, entity_id = item.id, "Claim failed: {:#}", e);
                report.failed += 1;
                return;
            }
        }

        match self.delivery.send(&compose(item)).await {
            Ok(()) => report.notified += 1,
            Err(e) => {
                tracing::warn!(entity_type = %item.kind, entity_id = item.id, "Delivery failed: {:#}", e);
                report.failed += 1;
                if let Err(e) = self.marks.release(item.kind, item.id, &window).await {
                    tracing::error!(
                        entity_type = %item.kind,
                        entity_id = item.id,
                        "Failed to release notification mark: {:#}",
                        e
                    );
                }
            }
        }
    }
}

fn label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Post => "Post",
        EntityKind::Comment => "Comment",
        EntityKind::ContactRequest => "Contact request",
        EntityKind::Transaction => "Transaction",
    }
}

/// Build the notification for one pending item
pub fn compose(item: &PendingItem) -> Notification {
    let label = label(item.kind);
    Notification {
        entity_type: item.kind,
        entity_id: item.id,
        user_id: item.user_id,
        email: item.email.clone(),
        subject: format!("{} #{} is still pending", label, item.id),
        body: format!(
            "{} #{} has been waiting for review since {}.",
            label,
            item.id,
            item.pending_since.format("%Y-%m-%d %H:%M UTC")
        ),
    }
}
