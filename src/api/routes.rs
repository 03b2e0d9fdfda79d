//! API route table

use axum::routing::{delete, get, post, put};
use axum::Router;

use super::handlers::{self, AppState};

/// Build the `/api/v1` router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Incidents (static segments before `:id`)
        .route(
            "/incidents",
            get(handlers::list_incidents).post(handlers::create_incident),
        )
        .route(
            "/incidents/search/history",
            get(handlers::search_history).delete(handlers::clear_search_history),
        )
        .route(
            "/incidents/filters/:session",
            get(handlers::session_filters).delete(handlers::clear_session_filters),
        )
        .route(
            "/incidents/:id",
            get(handlers::get_incident)
                .put(handlers::update_incident)
                .delete(handlers::delete_incident),
        )
        // Submissions
        .route("/submissions", post(handlers::create_submission))
        .route("/submissions/pending", get(handlers::list_pending))
        .route("/submissions/process", post(handlers::process_queue))
        .route("/submissions/:id", get(handlers::get_submission))
        .route("/submissions/:id/publish", post(handlers::publish_submission))
        .route("/submissions/:id/resubmit", post(handlers::resubmit))
        // Saved routes
        .route(
            "/routes",
            get(handlers::list_routes).post(handlers::create_route),
        )
        .route(
            "/routes/:id",
            get(handlers::get_route)
                .put(handlers::update_route)
                .delete(handlers::delete_route),
        )
        // Admin
        .route("/admission/:subject", delete(handlers::reset_admission))
        .route("/refresh", get(handlers::refresh_status))
        .route("/refresh/interval", put(handlers::set_refresh_interval))
        // Map
        .route("/geocode", get(handlers::geocode))
        .route("/geocode/reverse", get(handlers::reverse_geocode))
        .route("/map/tiles/:z/:x/:y", get(handlers::map_tile))
        .with_state(state)
}
