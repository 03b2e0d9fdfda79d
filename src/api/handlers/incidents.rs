//! Incident endpoints: CRUD, listing, search history, session filters

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use super::{incident_error, AppState};
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::model::{FilterSpec, IncidentDraft, IncidentPatch, ParseLabelError, QuerySpec};

/// Query string for `GET /incidents`
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(rename = "type")]
    pub incident_type: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub keyword: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
    /// Accumulate filters across requests under this key
    pub session: Option<String>,
}

fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, ParseLabelError>
where
    T: std::str::FromStr<Err = ParseLabelError>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>())
        .transpose()
}

impl ListParams {
    pub fn to_query(&self) -> Result<QuerySpec, ParseLabelError> {
        Ok(QuerySpec {
            filter: FilterSpec {
                incident_type: parse_opt(self.incident_type.as_deref())?,
                severity: parse_opt(self.severity.as_deref())?,
                status: parse_opt(self.status.as_deref())?,
            },
            keyword: self.keyword.clone().unwrap_or_default(),
            sort_by: parse_opt(self.sort_by.as_deref())?.unwrap_or_default(),
            order: parse_opt(self.order.as_deref())?.unwrap_or_default(),
        })
    }
}

/// GET /api/v1/incidents
pub async fn list_incidents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let query = match params.to_query() {
        Ok(q) => q,
        Err(e) => return ApiErrorResponse::bad_request(e.to_string()),
    };

    let result = match params.session.as_deref().filter(|s| !s.is_empty()) {
        Some(session) => state.incidents.list_for_session(session, &query),
        None => state.incidents.list(&query),
    };

    match result {
        Ok(incidents) => ApiResponse::ok(incidents),
        Err(e) => incident_error(e),
    }
}

/// POST /api/v1/incidents
pub async fn create_incident(
    State(state): State<AppState>,
    axum::Json(draft): axum::Json<IncidentDraft>,
) -> Response {
    match state.incidents.create(draft) {
        Ok(incident) => ApiResponse::created(incident),
        Err(e) => incident_error(e),
    }
}

/// GET /api/v1/incidents/:id
pub async fn get_incident(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.incidents.get(&id) {
        Ok(incident) => ApiResponse::ok(incident),
        Err(e) => incident_error(e),
    }
}

/// PUT /api/v1/incidents/:id
pub async fn update_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::Json(patch): axum::Json<IncidentPatch>,
) -> Response {
    match state.incidents.update(&id, patch) {
        Ok(incident) => ApiResponse::ok(incident),
        Err(e) => incident_error(e),
    }
}

/// DELETE /api/v1/incidents/:id
pub async fn delete_incident(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.incidents.delete(&id) {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "deleted": id })),
        Err(e) => incident_error(e),
    }
}

/// GET /api/v1/incidents/search/history
pub async fn search_history(State(state): State<AppState>) -> Response {
    ApiResponse::ok(state.incidents.pipeline().search_history())
}

/// DELETE /api/v1/incidents/search/history
pub async fn clear_search_history(State(state): State<AppState>) -> Response {
    state.incidents.pipeline().clear_search_history();
    ApiResponse::ok(serde_json::json!({ "cleared": true }))
}

/// GET /api/v1/incidents/filters/:session
pub async fn session_filters(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Response {
    ApiResponse::ok(state.incidents.sessions().active(&session))
}

/// DELETE /api/v1/incidents/filters/:session
pub async fn clear_session_filters(
    State(state): State<AppState>,
    Path(session): Path<String>,
) -> Response {
    let cleared = state.incidents.sessions().clear(&session);
    ApiResponse::ok(serde_json::json!({ "session": session, "cleared": cleared }))
}
