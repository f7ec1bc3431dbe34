//! Configuration management
//!
//! This module handles loading and parsing configuration for the Plaza
//! moderation service. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

use crate::models::EntityKind;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Pending-item notification configuration
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// SMTP settings used by the `smtp` delivery driver
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Webhook settings used by the `webhook` delivery driver
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/plaza.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a session token in days
    #[serde(default = "default_session_expiration_days")]
    pub expiration_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_session_expiration_days(),
        }
    }
}

/// Longest accepted session lifetime (ten years)
pub const MAX_SESSION_EXPIRATION_DAYS: i64 = 3_650;

fn default_session_expiration_days() -> i64 {
    7
}

/// Pending-item notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// An entity qualifies once it has been PENDING for this many minutes
    #[serde(default = "default_pending_after_minutes")]
    pub pending_after_minutes: i64,
    /// Entity kinds scanned by the dispatcher
    #[serde(default = "default_scan")]
    pub scan: Vec<EntityKind>,
    /// Bearer secret the external scheduler presents to the cron endpoint.
    /// The endpoint rejects every call when unset.
    #[serde(default)]
    pub cron_secret: Option<String>,
    /// Delivery driver
    #[serde(default)]
    pub delivery: DeliveryDriver,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            pending_after_minutes: default_pending_after_minutes(),
            scan: default_scan(),
            cron_secret: None,
            delivery: DeliveryDriver::default(),
        }
    }
}

/// Longest accepted pending threshold (one year)
pub const MAX_PENDING_AFTER_MINUTES: i64 = 525_600;

fn default_pending_after_minutes() -> i64 {
    60
}

fn default_scan() -> Vec<EntityKind> {
    vec![EntityKind::Transaction]
}

/// Notification delivery driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryDriver {
    /// Write notifications to the log (default)
    #[default]
    Log,
    /// Send notifications by email
    Smtp,
    /// POST notifications to a webhook
    Webhook,
}

/// SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_smtp_from")]
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: default_smtp_from(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "Plaza <no-reply@plaza.local>".to_string()
}

/// Webhook configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Target URL for notification payloads
    #[serde(default)]
    pub url: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - PLAZA_SERVER_HOST
    /// - PLAZA_SERVER_PORT
    /// - PLAZA_SERVER_CORS_ORIGIN
    /// - PLAZA_DATABASE_DRIVER
    /// - PLAZA_DATABASE_URL
    /// - PLAZA_NOTIFICATIONS_CRON_SECRET
    /// - PLAZA_NOTIFICATIONS_DELIVERY
    /// - PLAZA_NOTIFICATIONS_PENDING_AFTER_MINUTES
    /// - PLAZA_SMTP_HOST / PLAZA_SMTP_USERNAME / PLAZA_SMTP_PASSWORD
    /// - PLAZA_WEBHOOK_URL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_PENDING_AFTER_MINUTES).contains(&self.notifications.pending_after_minutes) {
            return Err(ConfigError::ValidationError(format!(
                "notifications.pending_after_minutes must be between 0 and {}",
                MAX_PENDING_AFTER_MINUTES
            )));
        }
        if !(1..=MAX_SESSION_EXPIRATION_DAYS).contains(&self.session.expiration_days) {
            return Err(ConfigError::ValidationError(format!(
                "session.expiration_days must be between 1 and {}",
                MAX_SESSION_EXPIRATION_DAYS
            )));
        }
        if self.notifications.delivery == DeliveryDriver::Webhook && self.webhook.url.is_none() {
            return Err(ConfigError::ValidationError(
                "webhook.url is required when notifications.delivery is 'webhook'".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("PLAZA_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PLAZA_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("PLAZA_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("PLAZA_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("PLAZA_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("PLAZA_NOTIFICATIONS_CRON_SECRET") {
            if !secret.is_empty() {
                self.notifications.cron_secret = Some(secret);
            }
        }
        if let Ok(driver) = std::env::var("PLAZA_NOTIFICATIONS_DELIVERY") {
            match driver.to_lowercase().as_str() {
                "log" => self.notifications.delivery = DeliveryDriver::Log,
                "smtp" => self.notifications.delivery = DeliveryDriver::Smtp,
                "webhook" => self.notifications.delivery = DeliveryDriver::Webhook,
                _ => {}
            }
        }
        if let Ok(minutes) = std::env::var("PLAZA_NOTIFICATIONS_PENDING_AFTER_MINUTES") {
            if let Ok(minutes) = minutes.parse::<i64>() {
                self.notifications.pending_after_minutes = minutes;
            }
        }

        if let Ok(host) = std::env::var("PLAZA_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Ok(username) = std::env::var("PLAZA_SMTP_USERNAME") {
            self.smtp.username = username;
        }
        if let Ok(password) = std::env::var("PLAZA_SMTP_PASSWORD") {
            self.smtp.password = password;
        }

        if let Ok(url) = std::env::var("PLAZA_WEBHOOK_URL") {
            self.webhook.url = Some(url);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_server_config_strategy() -> impl Strategy<Value = ServerConfig> {
        (
            prop_oneof![Just("0.0.0.0".to_string()), Just("127.0.0.1".to_string()), "[a-z]{3,10}\\.local"],
            1u16..=65535,
        )
            .prop_map(|(host, port)| ServerConfig {
                host,
                port,
                cors_origin: default_cors_origin(),
            })
    }

    fn scan_strategy() -> impl Strategy<Value = Vec<EntityKind>> {
        prop::collection::vec(
            prop_oneof![
                Just(EntityKind::Post),
                Just(EntityKind::Comment),
                Just(EntityKind::ContactRequest),
                Just(EntityKind::Transaction),
            ],
            0..4,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn config_yaml_roundtrip(
            server in valid_server_config_strategy(),
            minutes in 0i64..10_000,
            scan in scan_strategy(),
        ) {
            let config = Config {
                server,
                notifications: NotificationConfig {
                    pending_after_minutes: minutes,
                    scan,
                    ..NotificationConfig::default()
                },
                ..Config::default()
            };

            let yaml = serde_yaml::to_string(&config).unwrap();
            let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

            prop_assert_eq!(parsed.server.host, config.server.host);
            prop_assert_eq!(parsed.server.port, config.server.port);
            prop_assert_eq!(parsed.notifications.pending_after_minutes, minutes);
            prop_assert_eq!(parsed.notifications.scan, config.notifications.scan);
        }
    }
}
