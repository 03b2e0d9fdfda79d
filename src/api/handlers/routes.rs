//! Saved route endpoints

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;

use super::{route_error, AppState};
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::model::RouteDraft;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId", alias = "user_id")]
    pub user_id: Option<String>,
}

/// GET /api/v1/routes?userId=
pub async fn list_routes(State(state): State<AppState>, Query(q): Query<UserQuery>) -> Response {
    let Some(user_id) = q.user_id.filter(|u| !u.trim().is_empty()) else {
        return ApiErrorResponse::bad_request("userId query parameter is required");
    };
    match state.routes.list_for_user(&user_id) {
        Ok(routes) => ApiResponse::ok(routes),
        Err(e) => route_error(e),
    }
}

/// POST /api/v1/routes
pub async fn create_route(
    State(state): State<AppState>,
    axum::Json(draft): axum::Json<RouteDraft>,
) -> Response {
    match state.routes.add(draft) {
        Ok(route) => ApiResponse::created(route),
        Err(e) => route_error(e),
    }
}

/// GET /api/v1/routes/:id
pub async fn get_route(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.routes.get(&id) {
        Ok(route) => ApiResponse::ok(route),
        Err(e) => route_error(e),
    }
}

/// PUT /api/v1/routes/:id
pub async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
    axum::Json(draft): axum::Json<RouteDraft>,
) -> Response {
    match state.routes.update(&id, draft) {
        Ok(route) => ApiResponse::ok(route),
        Err(e) => route_error(e),
    }
}

/// DELETE /api/v1/routes/:id
pub async fn delete_route(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.routes.delete(&id) {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "deleted": id })),
        Err(e) => route_error(e),
    }
}
