//! Common API utilities and shared types
//!
//! Query strings and bodies are taken as raw strings and parsed here, so a
//! bad value comes back as a `VALIDATION_FAILED` body instead of axum's
//! plain-text rejection.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::middleware::ApiError;

// ============================================================================
// Query Types
// ============================================================================

/// `?status=` filter for listings
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

/// `?role=` filter for the user listing
#[derive(Debug, Default, Deserialize)]
pub struct RoleQuery {
    pub role: Option<String>,
}

/// `?entity_type=&entity_id=` filter for the audit trail
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

// ============================================================================
// Request Bodies
// ============================================================================

/// Body of every `PUT .../status` moderation call
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: String,
}

/// Body of `PUT /admin/users/{id}/status`
#[derive(Debug, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub status: String,
    #[serde(default)]
    pub suspended_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reason: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Response to a successful delete
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(id: i64) -> Self {
        Self { id, deleted: true }
    }
}

// ============================================================================
// Extractor Helpers
// ============================================================================

/// Unwrap a JSON body, turning axum's rejection into `VALIDATION_FAILED`
pub fn json_body<T: DeserializeOwned>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| {
            ApiError::validation_failed("Invalid request body")
                .with_details(serde_json::json!({ "reason": rejection.body_text() }))
        })
}

/// Unwrap a query string, turning axum's rejection into `VALIDATION_FAILED`
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query.map(|Query(params)| params).map_err(|rejection| {
        ApiError::validation_failed("Invalid query string")
            .with_details(serde_json::json!({ "reason": rejection.body_text() }))
    })
}

/// Unwrap a numeric path id
pub fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::validation_failed("Identifier must be an integer"))
}
