//! API route handlers
//!
//! Thin translation between HTTP and the core services:
//! - incidents: CRUD plus filter / search / sort listings
//! - submissions: validate → admission → enqueue, publish and resubmit
//! - routes: saved monitoring routes
//! - admin: health, admission reset, refresh scheduler control, geocoding

mod admin;
mod incidents;
mod routes;
mod submissions;

pub use admin::*;
pub use incidents::*;
pub use routes::*;
pub use submissions::*;

use axum::response::Response;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;

use super::envelope::ApiErrorResponse;
use crate::admission::SubmissionAdmission;
use crate::geocode::Geocoder;
use crate::incidents::{IncidentError, IncidentService};
use crate::queue::{OfflineSubmissionQueue, QueueError, SubmissionPublisher};
use crate::refresh::{RefreshScheduler, RefreshSnapshot};
use crate::routes::{RouteError, SavedRoutesService};
use crate::storage::{IncidentStore, RouteStore, SubmissionStore};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub incidents: Arc<IncidentService>,
    pub queue: Arc<OfflineSubmissionQueue>,
    pub publisher: Arc<SubmissionPublisher>,
    pub admission: Arc<SubmissionAdmission>,
    pub routes: Arc<SavedRoutesService>,
    pub geocoder: Arc<dyn Geocoder>,
    /// Present once the binary has wired the refresh scheduler
    pub refresh: Option<Arc<RefreshScheduler>>,
    pub refresh_rx: Option<watch::Receiver<Option<RefreshSnapshot>>>,
}

impl AppState {
    /// Build every service on top of one store backend.
    pub fn new<S>(store: Arc<S>, admission: Arc<SubmissionAdmission>, geocoder: Arc<dyn Geocoder>) -> Self
    where
        S: IncidentStore + SubmissionStore + RouteStore + 'static,
    {
        let incidents = Arc::new(IncidentService::new(store.clone()));
        let queue = Arc::new(OfflineSubmissionQueue::new(store.clone()));
        let publisher = Arc::new(SubmissionPublisher::new(queue.clone(), incidents.clone()));
        Self {
            incidents,
            queue,
            publisher,
            admission,
            routes: Arc::new(SavedRoutesService::new(store)),
            geocoder,
            refresh: None,
            refresh_rx: None,
        }
    }

    pub fn with_refresh(
        mut self,
        scheduler: Arc<RefreshScheduler>,
        rx: watch::Receiver<Option<RefreshSnapshot>>,
    ) -> Self {
        self.refresh = Some(scheduler);
        self.refresh_rx = Some(rx);
        self
    }
}

// ============================================================================
// Error mapping
// ============================================================================

pub(crate) fn incident_error(err: IncidentError) -> Response {
    match err {
        IncidentError::Validation(report) => ApiErrorResponse::validation(report.errors),
        IncidentError::NotFound(id) => ApiErrorResponse::not_found(format!("Incident not found: {id}")),
        IncidentError::AlreadyExists(id) => {
            ApiErrorResponse::conflict(format!("Incident already exists: {id}"))
        }
        IncidentError::Storage(e) => {
            error!(error = %e, "Incident storage failure");
            ApiErrorResponse::internal("Storage failure")
        }
    }
}

pub(crate) fn queue_error(err: QueueError) -> Response {
    match err {
        QueueError::NotFound(id) => ApiErrorResponse::not_found(format!("Submission not found: {id}")),
        e @ QueueError::NotResubmittable { .. } => ApiErrorResponse::conflict(e.to_string()),
        QueueError::Payload(msg) => ApiErrorResponse::bad_request(msg),
        e @ QueueError::StatusNotUpdated { .. } => {
            error!(error = %e, "Submission status not persisted");
            ApiErrorResponse::internal(e.to_string())
        }
        QueueError::Storage(e) => {
            error!(error = %e, "Submission storage failure");
            ApiErrorResponse::internal("Storage failure")
        }
    }
}

pub(crate) fn route_error(err: RouteError) -> Response {
    match err {
        RouteError::Validation(report) => ApiErrorResponse::validation(report.errors),
        RouteError::NotFound(id) => ApiErrorResponse::not_found(format!("Route not found: {id}")),
        RouteError::Storage(e) => {
            error!(error = %e, "Route storage failure");
            ApiErrorResponse::internal("Storage failure")
        }
    }
}
