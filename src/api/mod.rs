//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints of the Plaza moderation core.
//! It includes:
//! - Moderator endpoints (review queue for posts and comments)
//! - Admin endpoints (all review queues, audit trail, accounts)
//! - The scheduler trigger for pending notifications

pub mod admin;
pub mod common;
pub mod cron;
pub mod middleware;
pub mod moderator;

#[cfg(test)]
mod tests;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, RoleGate};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (admin role only)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn_with_state(
            RoleGate::ADMIN,
            middleware::require_roles,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_session,
        ));

    // Moderator routes (moderators and admins)
    let moderator_routes = Router::new()
        .nest("/moderator", moderator::router())
        .route_layer(axum_middleware::from_fn_with_state(
            RoleGate::MODERATION,
            middleware::require_roles,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::resolve_session,
        ));

    // Scheduler routes (bearer secret checked in the handler)
    Router::new()
        .nest("/cron", cron::router())
        .merge(admin_routes)
        .merge(moderator_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!("Ignoring invalid CORS origin: {}", cors_origin),
    }

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
