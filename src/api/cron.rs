//! Scheduler trigger
//!
//! `POST /api/v1/cron/notify-pending` runs one dispatcher pass. The caller
//! must present `notifications.cron_secret` as a bearer token; without a
//! configured secret the endpoint refuses everyone.

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::Utc;
use subtle::ConstantTimeEq;

use crate::api::middleware::{bearer_token, ApiError, AppState};
use crate::models::DispatchReport;

pub fn router() -> Router<AppState> {
    Router::new().route("/notify-pending", post(notify_pending))
}

/// Constant-time secret comparison
fn secrets_match(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// POST /api/v1/cron/notify-pending
async fn notify_pending(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DispatchReport>, ApiError> {
    let expected = state
        .cron_secret
        .as_deref()
        .ok_or_else(|| ApiError::unauthenticated("Cron trigger is not configured"))?;

    match bearer_token(&headers) {
        Some(given) if secrets_match(given, expected) => {}
        _ => return Err(ApiError::unauthenticated("Invalid cron secret")),
    }

    let report = state.dispatcher.dispatch_pending(Utc::now()).await?;
    Ok(Json(report))
}
