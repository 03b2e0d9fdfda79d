//! Persistence collaborators
//!
//! Abstract stores for incidents, submissions and saved routes, so backends
//! can be swapped without touching service code:
//! - [`InMemoryStore`]: thread-safe in-memory store for tests and `--memory`
//! - [`SledStore`]: durable sled-backed store, one tree per record kind
//!
//! All operations return [`StorageError`]; lower-layer failures are
//! converted here and never escape as panics.

mod memory;
mod sled_store;

pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use crate::model::{Incident, IncidentStatus, SavedRoute, Submission, SubmissionStatus};

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Incident persistence
pub trait IncidentStore: Send + Sync {
    /// All incidents, newest first
    fn all(&self) -> Result<Vec<Incident>, StorageError>;

    fn get(&self, id: &str) -> Result<Option<Incident>, StorageError>;

    /// Insert or update, keyed by id
    fn save(&self, incident: &Incident) -> Result<(), StorageError>;

    /// Atomically insert an incident whose id is not yet present.
    ///
    /// Returns false (and writes nothing) if the id already exists.
    fn insert_new(&self, incident: &Incident) -> Result<bool, StorageError>;

    /// Returns false if the id was unknown
    fn delete(&self, id: &str) -> Result<bool, StorageError>;

    /// Incidents with the given status, newest first
    fn by_status(&self, status: IncidentStatus) -> Result<Vec<Incident>, StorageError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|i| i.status == status)
            .collect())
    }
}

/// Submission persistence
pub trait SubmissionStore: Send + Sync {
    /// Atomically insert a submission whose id is not yet present.
    ///
    /// Returns false (and writes nothing) if the id already exists.
    fn insert_new(&self, submission: &Submission) -> Result<bool, StorageError>;

    fn get(&self, id: &str) -> Result<Option<Submission>, StorageError>;

    /// Submissions with the given status, oldest first
    fn by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>, StorageError>;

    /// Pending submissions, oldest first
    fn pending(&self) -> Result<Vec<Submission>, StorageError> {
        self.by_status(SubmissionStatus::Pending)
    }

    /// Atomically move `id` from `expected` to `next`.
    ///
    /// Returns false if the id is unknown or its status is not `expected`.
    fn compare_and_set_status(
        &self,
        id: &str,
        expected: SubmissionStatus,
        next: SubmissionStatus,
    ) -> Result<bool, StorageError>;

    fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

/// Saved route persistence
pub trait RouteStore: Send + Sync {
    fn for_user(&self, user_id: &str) -> Result<Vec<SavedRoute>, StorageError>;

    fn get(&self, id: &str) -> Result<Option<SavedRoute>, StorageError>;

    fn save(&self, route: &SavedRoute) -> Result<(), StorageError>;

    fn delete(&self, id: &str) -> Result<bool, StorageError>;
}

/// Newest-first ordering used by incident listings.
pub(crate) fn sort_newest_first(incidents: &mut [Incident]) {
    incidents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Oldest-first ordering used by the submission queue.
pub(crate) fn sort_oldest_first(submissions: &mut [Submission]) {
    submissions.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}
