//! Notification delivery
//!
//! The dispatcher hands each notification to a [`NotificationDelivery`].
//! Three drivers exist, picked by `notifications.delivery`:
//! - `log`: write the notification to the tracing log
//! - `smtp`: email the entity owner through lettre
//! - `webhook`: POST the notification as JSON through reqwest

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::{Config, DeliveryDriver, SmtpConfig};
use crate::models::Notification;

/// Sends one notification. Errors are reported, never retried here.
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Build the driver selected in configuration
pub fn build_delivery(config: &Config) -> Result<Arc<dyn NotificationDelivery>> {
    match config.notifications.delivery {
        DeliveryDriver::Log => Ok(Arc::new(LogDelivery)),
        DeliveryDriver::Smtp => Ok(Arc::new(SmtpDelivery::new(&config.smtp)?)),
        DeliveryDriver::Webhook => {
            let url = config
                .webhook
                .url
                .clone()
                .ok_or_else(|| anyhow!("webhook.url is not configured"))?;
            Ok(Arc::new(WebhookDelivery::new(url)))
        }
    }
}

/// Writes notifications to the log
pub struct LogDelivery;

#[async_trait]
impl NotificationDelivery for LogDelivery {
    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            entity_type = %notification.entity_type,
            entity_id = notification.entity_id,
            recipient = notification.email.as_deref().unwrap_or("-"),
            "{}",
            notification.subject
        );
        Ok(())
    }
}

/// Emails the entity owner
pub struct SmtpDelivery {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpDelivery {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        // Validate the sender once instead of on every send
        config
            .from
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        Ok(Self {
            mailer: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl NotificationDelivery for SmtpDelivery {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let to = notification
            .email
            .as_deref()
            .ok_or_else(|| anyhow!("No recipient address for {} {}", notification.entity_type, notification.entity_id))?;

        let email = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        Ok(())
    }
}

/// POSTs notifications as JSON
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
}

impl WebhookDelivery {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationDelivery for WebhookDelivery {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .context("Webhook request failed")?
            .error_for_status()
            .context("Webhook rejected notification")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    fn notification(email: Option<&str>) -> Notification {
        Notification {
            entity_type: EntityKind::Transaction,
            entity_id: 1,
            user_id: Some(1),
            email: email.map(str::to_string),
            subject: "Transaction 1 is still pending".to_string(),
            body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_delivery_succeeds() {
        LogDelivery.send(&notification(None)).await.unwrap();
    }

    #[test]
    fn test_build_delivery_defaults_to_log() {
        assert!(build_delivery(&Config::default()).is_ok());
    }

    #[test]
    fn test_build_webhook_requires_url() {
        let mut config = Config::default();
        config.notifications.delivery = DeliveryDriver::Webhook;
        assert!(build_delivery(&config).is_err());

        config.webhook.url = Some("http://127.0.0.1:9/hook".to_string());
        assert!(build_delivery(&config).is_ok());
    }

    #[tokio::test]
    async fn test_smtp_requires_host() {
        let mut config = Config::default();
        config.notifications.delivery = DeliveryDriver::Smtp;
        config.smtp.host = String::new();
        assert!(build_delivery(&config).is_err());
    }

    #[tokio::test]
    async fn test_smtp_without_recipient_fails() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            ..SmtpConfig::default()
        };
        let delivery = SmtpDelivery::new(&config).unwrap();
        assert!(delivery.send(&notification(None)).await.is_err());
    }

    #[tokio::test]
    async fn test_webhook_unreachable_fails() {
        let delivery = WebhookDelivery::new("http://127.0.0.1:9/hook".to_string());
        assert!(delivery.send(&notification(Some("a@example.com"))).await.is_err());
    }
}
