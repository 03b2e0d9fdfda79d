//! Operational endpoints: health, admission reset, refresh control, geocoding

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AppState;
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults::MIN_REFRESH_INTERVAL_MS;
use crate::geocode::tile_url;
use crate::refresh::{RefreshSnapshot, RefreshStats};

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tracked_subjects: usize,
    pub refresh_running: bool,
}

/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        tracked_subjects: state.admission.tracked_subjects(),
        refresh_running: state.refresh.as_ref().is_some_and(|r| r.is_running()),
    })
}

// ============================================================================
// Admission
// ============================================================================

/// DELETE /api/v1/admission/:subject
pub async fn reset_admission(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Response {
    let reset = state.admission.reset_subject(&subject);
    ApiResponse::ok(serde_json::json!({ "subject": subject, "reset": reset }))
}

// ============================================================================
// Refresh scheduler
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub running: bool,
    pub interval_ms: u64,
    pub stats: RefreshStats,
    pub last: Option<RefreshSnapshot>,
}

/// GET /api/v1/refresh
pub async fn refresh_status(State(state): State<AppState>) -> Response {
    let Some(scheduler) = state.refresh.as_ref() else {
        return ApiErrorResponse::service_unavailable("Refresh scheduler not configured");
    };
    let last = state
        .refresh_rx
        .as_ref()
        .and_then(|rx| rx.borrow().clone());
    ApiResponse::ok(RefreshStatus {
        running: scheduler.is_running(),
        interval_ms: scheduler.interval_ms(),
        stats: scheduler.stats(),
        last,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetIntervalRequest {
    pub interval_ms: u64,
}

/// PUT /api/v1/refresh/interval
pub async fn set_refresh_interval(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<SetIntervalRequest>,
) -> Response {
    let Some(scheduler) = state.refresh.as_ref() else {
        return ApiErrorResponse::service_unavailable("Refresh scheduler not configured");
    };
    if !scheduler.set_interval(req.interval_ms) {
        return ApiErrorResponse::bad_request(format!(
            "Interval must be at least {MIN_REFRESH_INTERVAL_MS} ms"
        ));
    }
    ApiResponse::ok(serde_json::json!({
        "intervalMs": scheduler.interval_ms(),
        "running": scheduler.is_running(),
    }))
}

// ============================================================================
// Geocoding
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
}

/// GET /api/v1/geocode?address=
pub async fn geocode(State(state): State<AppState>, Query(q): Query<GeocodeQuery>) -> Response {
    if q.address.trim().is_empty() {
        return ApiErrorResponse::bad_request("address is required");
    }
    match state.geocoder.geocode(q.address.trim()).await {
        Ok(coords) => ApiResponse::ok(coords),
        Err(e) => {
            warn!(address = %q.address, error = %e, "Geocoding failed");
            ApiErrorResponse::bad_gateway(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lon: f64,
}

/// GET /api/v1/geocode/reverse?lat=&lon=
pub async fn reverse_geocode(
    State(state): State<AppState>,
    Query(q): Query<ReverseQuery>,
) -> Response {
    let report = crate::validation::validate_coordinates(Some(q.lat), Some(q.lon));
    if !report.valid {
        return ApiErrorResponse::validation(report.errors);
    }
    match state.geocoder.reverse(q.lat, q.lon).await {
        Ok(address) => ApiResponse::ok(serde_json::json!({ "address": address })),
        Err(e) => {
            warn!(lat = q.lat, lon = q.lon, error = %e, "Reverse geocoding failed");
            ApiErrorResponse::bad_gateway(e.to_string())
        }
    }
}

/// GET /api/v1/map/tiles/:z/:x/:y
pub async fn map_tile(Path((z, x, y)): Path<(u8, u32, u32)>) -> Response {
    ApiResponse::ok(serde_json::json!({ "url": tile_url(z, x, y) }))
}
