//! Shared data structures for traffic incident reporting
//!
//! - `incident`: IncidentRecord, its closed vocabularies and the raw draft payload
//! - `patch`: explicit keep / clear / set partial-update type
//! - `submission`: queued submission records and their status machine
//! - `query`: filter, search and sort request types
//! - `route`: saved monitoring routes

mod incident;
mod patch;
mod query;
mod route;
mod submission;

pub use incident::{
    Incident, IncidentDraft, IncidentPatch, IncidentStatus, IncidentType, ParseLabelError,
    Severity,
};
pub use patch::Patch;
pub use query::{FilterField, FilterSpec, QuerySpec, SortKey, SortOrder};
pub use route::{RouteDraft, SavedRoute, DEFAULT_ROUTE_RADIUS_M};
pub use submission::{Submission, SubmissionStatus};

/// Generate a prefixed opaque identifier (`inc_…`, `sub_…`, `route_…`).
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}
