//! API handlers for the HTTP REST API

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::db::{AlertStore, SubjectDirectory};
use crate::error::{Error, Result};
use crate::ingest::IngestPipeline;
use crate::live::ConnectionRegistry;
use crate::models::{AlertSettings, AlertSettingsInput, HealthAlert, Reading, Submission};

use super::auth::Actor;

/// Hard cap on any list request
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Ingestion entry point
    pub pipeline: IngestPipeline,
    /// Readings, alerts and settings
    pub store: Arc<dyn AlertStore>,
    /// Subject lookup
    pub directory: Arc<dyn SubjectDirectory>,
    /// Live sessions by identity
    pub registry: Arc<ConnectionRegistry>,
    /// Default list sizes
    pub limits: StoreConfig,
    /// Outbound queue size for new live sessions
    pub session_buffer: usize,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when the store answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Registered live sessions
    pub live_sessions: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.store.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        live_sessions: state.registry.len(),
    }))
}

/// Optional `?limit=` on list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Maximum number of items returned
    pub limit: Option<i64>,
}

impl ListQuery {
    fn resolve(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
    }
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| Error::validation(e.body_text()))
}

/// Ingest a single reading
pub async fn ingest_reading(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Submission>, JsonRejection>,
) -> Result<(StatusCode, Json<Reading>)> {
    let submission = body(payload)?;
    let reading = state.pipeline.submit(submission).await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// Latest readings for a subject
pub async fn list_readings(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Reading>>> {
    let limit = query.resolve(state.limits.reading_history_limit);
    let readings = state.store.recent_readings(subject_id, limit).await?;
    Ok(Json(readings))
}

/// Alerts for a subject
pub async fn list_subject_alerts(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<HealthAlert>>> {
    let limit = query.resolve(state.limits.alert_list_limit);
    let alerts = state.store.alerts_for_subject(subject_id, limit).await?;
    Ok(Json(alerts))
}

/// Unresolved alerts across all subjects
pub async fn list_unresolved_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<HealthAlert>>> {
    let limit = query.resolve(state.limits.alert_list_limit);
    let alerts = state.store.unresolved_alerts(limit).await?;
    Ok(Json(alerts))
}

/// Resolve an alert; observers only
pub async fn resolve_alert(
    State(state): State<AppState>,
    actor: Actor,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<HealthAlert>> {
    actor.require_observer()?;

    let alert = state.store.resolve_alert(alert_id, &actor.id).await?;
    info!(alert_id = %alert_id, resolved_by = %actor.id, "Alert resolved");
    Ok(Json(alert))
}

/// Effective settings for a subject, defaults when none are stored
pub async fn get_settings(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> Result<Json<AlertSettings>> {
    let settings = state
        .store
        .get_settings(subject_id)
        .await?
        .unwrap_or_else(|| AlertSettings::defaults_for(subject_id));
    Ok(Json(settings))
}

/// Create or replace settings for a subject
pub async fn put_settings(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
    payload: std::result::Result<Json<AlertSettingsInput>, JsonRejection>,
) -> Result<Json<AlertSettings>> {
    let input = body(payload)?;
    input.validate()?;

    if state.directory.get_subject(subject_id).await?.is_none() {
        return Err(Error::not_found("Subject", subject_id));
    }

    let settings = state.store.upsert_settings(subject_id, &input).await?;
    info!(subject_id = %subject_id, "Alert settings updated");
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, 50, 50)]
    #[case(Some(10), 50, 10)]
    #[case(Some(0), 50, 1)]
    #[case(Some(-5), 50, 1)]
    #[case(Some(50_000), 50, MAX_LIST_LIMIT)]
    fn limits_are_clamped(#[case] limit: Option<i64>, #[case] default: i64, #[case] expected: i64) {
        assert_eq!(ListQuery { limit }.resolve(default), expected);
    }
}
