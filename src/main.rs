//! Plaza - moderation and authorization core

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plaza::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            CommentRepositoryImpl, SqlxContactRequestRepository, SqlxModerationRepository,
            SqlxModeratorApplicationRepository, SqlxNotificationMarkRepository,
            SqlxPostRepository, SqlxSessionRepository, SqlxTransactionRepository,
            SqlxUserRepository,
        },
    },
    services::{build_delivery, ModerationService, NotificationDispatcher, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plaza=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Plaza moderation core...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create services
    let user_service = Arc::new(UserService::with_session_expiration(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
        config.session.expiration_days,
    ));
    let removed = user_service.cleanup_expired_sessions().await?;
    if removed > 0 {
        tracing::info!("Removed {} expired sessions", removed);
    }

    let moderation_service = Arc::new(ModerationService::new(
        SqlxPostRepository::boxed(pool.clone()),
        Arc::new(CommentRepositoryImpl::new(pool.clone())),
        SqlxModeratorApplicationRepository::boxed(pool.clone()),
        SqlxContactRequestRepository::boxed(pool.clone()),
        SqlxTransactionRepository::boxed(pool.clone()),
        SqlxModerationRepository::boxed(pool.clone()),
    ));

    let delivery = build_delivery(&config)?;
    tracing::info!("Notification delivery: {:?}", config.notifications.delivery);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        SqlxModerationRepository::boxed(pool.clone()),
        SqlxNotificationMarkRepository::boxed(pool.clone()),
        delivery,
        &config.notifications,
    ));

    if config.notifications.cron_secret.is_none() {
        tracing::warn!("notifications.cron_secret is not set; the cron trigger is disabled");
    }

    let state = AppState {
        user_service,
        moderation_service,
        dispatcher,
        cron_secret: config.notifications.cron_secret.as_deref().map(Arc::from),
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
