//! Submission endpoints: admission-controlled intake and the publish step

use axum::extract::{Path, State};
use axum::response::Response;
use tracing::{error, info};

use super::{queue_error, AppState};
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::model::IncidentDraft;
use crate::validation;

/// Subject used for rate limiting when a report carries no reporter id
pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// POST /api/v1/submissions
///
/// Validate → admission check on the reporter → enqueue.
pub async fn create_submission(
    State(state): State<AppState>,
    axum::Json(mut draft): axum::Json<IncidentDraft>,
) -> Response {
    // Identity and status are assigned on publish, never by the reporter.
    draft.id = None;
    draft.status = None;
    draft.location = draft.location.as_deref().map(validation::sanitize_string);
    draft.description = draft.description.as_deref().map(validation::sanitize_string);

    let report = validation::validate(&draft);
    if !report.valid {
        return ApiErrorResponse::validation(report.errors);
    }

    let subject = draft
        .reporter_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_SUBJECT)
        .to_string();

    if !state.admission.can_submit(&subject) {
        return ApiErrorResponse::too_many_requests(format!(
            "Submission limit reached for {subject}: {} per {} ms",
            state.admission.limit(),
            state.admission.window_ms()
        ));
    }

    let payload = match serde_json::to_string(&draft) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "Failed to encode submission payload");
            return ApiErrorResponse::internal("Failed to encode submission");
        }
    };

    match state.queue.enqueue(payload) {
        Ok(submission) => {
            info!(submission_id = %submission.id, subject = %subject, "Submission accepted");
            ApiResponse::created(submission)
        }
        Err(e) => queue_error(e),
    }
}

/// GET /api/v1/submissions/pending
pub async fn list_pending(State(state): State<AppState>) -> Response {
    match state.queue.list_pending() {
        Ok(pending) => ApiResponse::ok(pending),
        Err(e) => queue_error(e),
    }
}

/// GET /api/v1/submissions/:id
pub async fn get_submission(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.queue.get(&id) {
        Ok(Some(submission)) => ApiResponse::ok(submission),
        Ok(None) => ApiErrorResponse::not_found(format!("Submission not found: {id}")),
        Err(e) => queue_error(e),
    }
}

/// POST /api/v1/submissions/:id/publish
pub async fn publish_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.publisher.publish(&id) {
        Ok(outcome) => ApiResponse::ok(outcome),
        Err(e) => queue_error(e),
    }
}

/// POST /api/v1/submissions/process
pub async fn process_queue(State(state): State<AppState>) -> Response {
    match state.publisher.publish_all() {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => queue_error(e),
    }
}

/// POST /api/v1/submissions/:id/resubmit
pub async fn resubmit(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.queue.resubmit(&id) {
        Ok(fresh) => ApiResponse::created(fresh),
        Err(e) => queue_error(e),
    }
}
