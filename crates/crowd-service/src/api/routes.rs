use crate::error::ApiError;
use crate::state::{CrowdServiceState, SharedMonitor};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use common::validation::validate_id;
use crowd_analytics::{
    Alert, AnalyticsReport, FrameAnalysis, FrameInput, MonitorSettings, SettingsUpdate, Snapshot,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub include_dismissed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertListResponse {
    pub alerts: Vec<Alert>,
    pub active: usize,
    pub has_active_critical: bool,
}

/// Health check endpoint
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "crowd-service"
        })),
    )
}

/// Prometheus metrics endpoint
pub async fn metrics() -> Result<String, ApiError> {
    telemetry::metrics::encode_metrics().map_err(|e| {
        tracing::error!("Failed to encode metrics: {}", e);
        ApiError::internal("Failed to encode metrics")
    })
}

pub async fn list_venues(State(state): State<CrowdServiceState>) -> impl IntoResponse {
    Json(json!({ "venues": state.venue_ids().await }))
}

async fn existing_venue(state: &CrowdServiceState, venue_id: &str) -> Result<SharedMonitor, ApiError> {
    validate_id(venue_id, "venue_id")?;
    state
        .venue(venue_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Venue '{}' not found", venue_id)))
}

/// Run one analysis cycle for a frame of detections
pub async fn submit_frame(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
    Json(input): Json<FrameInput>,
) -> Result<Json<FrameAnalysis>, ApiError> {
    validate_id(&venue_id, "venue_id")?;
    let monitor = state.venue_or_create(&venue_id).await?;
    let mut monitor = monitor.lock().await;

    let mut rng = StdRng::from_entropy();
    let analysis = monitor.process_frame(&input, &mut rng).map_err(|e| {
        tracing::warn!(venue_id = %venue_id, error = %e, "Rejected frame");
        ApiError::from(e)
    })?;

    Ok(Json(analysis))
}

pub async fn list_alerts(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<AlertListResponse>, ApiError> {
    let monitor = existing_venue(&state, &venue_id).await?;
    let monitor = monitor.lock().await;
    let feed = monitor.feed();

    let alerts: Vec<Alert> = if query.include_dismissed {
        feed.all().to_vec()
    } else {
        feed.active().into_iter().cloned().collect()
    };

    Ok(Json(AlertListResponse {
        alerts,
        active: feed.active().len(),
        has_active_critical: feed.has_active_critical(),
    }))
}

pub async fn dismiss_alert(
    State(state): State<CrowdServiceState>,
    Path((venue_id, alert_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let monitor = existing_venue(&state, &venue_id).await?;
    let mut monitor = monitor.lock().await;

    if !monitor.dismiss_alert(alert_id) {
        return Err(ApiError::not_found(format!("Alert '{}' not found", alert_id)));
    }

    Ok(Json(json!({ "dismissed": 1, "alert_id": alert_id })))
}

pub async fn dismiss_all_alerts(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let monitor = existing_venue(&state, &venue_id).await?;
    let dismissed = monitor.lock().await.dismiss_all_alerts();
    Ok(Json(json!({ "dismissed": dismissed })))
}

pub async fn get_history(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
) -> Result<Json<Vec<Snapshot>>, ApiError> {
    let monitor = existing_venue(&state, &venue_id).await?;
    let snapshots = monitor.lock().await.history().snapshots();
    Ok(Json(snapshots))
}

/// Clear snapshot history and alerts; analytics are kept
pub async fn reset_history(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let monitor = existing_venue(&state, &venue_id).await?;
    monitor.lock().await.reset();
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_analytics(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let monitor = existing_venue(&state, &venue_id).await?;
    let report = monitor.lock().await.analytics().report(Utc::now());
    Ok(Json(report))
}

pub async fn get_settings(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
) -> Result<Json<MonitorSettings>, ApiError> {
    let monitor = existing_venue(&state, &venue_id).await?;
    let settings = monitor.lock().await.settings().clone();
    Ok(Json(settings))
}

/// Change capacity, thresholds or clustering settings. Creates the venue
/// when it does not exist yet so it can be configured before the first frame;
/// an invalid update creates nothing.
pub async fn update_settings(
    State(state): State<CrowdServiceState>,
    Path(venue_id): Path<String>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<MonitorSettings>, ApiError> {
    validate_id(&venue_id, "venue_id")?;
    let monitor = match state.venue(&venue_id).await {
        Some(monitor) => monitor,
        None => {
            update.apply_to(state.defaults()).validate()?;
            state.venue_or_create(&venue_id).await?
        }
    };
    let mut monitor = monitor.lock().await;
    let settings = monitor.update_settings(&update)?.clone();
    Ok(Json(settings))
}
