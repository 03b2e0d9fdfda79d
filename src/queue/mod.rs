//! Offline submission queue
//!
//! Status machine over [`Submission`] records held in a [`SubmissionStore`]:
//!
//! ```text
//! pending ──publish ok──▶ sent
//!    │
//!    └──publish failed──▶ failed
//! ```
//!
//! `sent` and `failed` are terminal. Resubmitting a failed report enqueues a
//! new pending record with the same payload; the failed one stays as it is.
//!
//! Transitions go through the store's compare-and-set, so two callers racing
//! on the same id cannot both move it.

pub mod publish;

pub use publish::{PublishOutcome, PublishSummary, SubmissionPublisher};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::model::{Submission, SubmissionStatus};
use crate::storage::{StorageError, SubmissionStore};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("submission not found: {0}")]
    NotFound(String),
    #[error("submission {id} is {status}, only failed submissions can be resubmitted")]
    NotResubmittable { id: String, status: SubmissionStatus },
    #[error("invalid submission payload: {0}")]
    Payload(String),
    #[error("submission {id} could not be marked {status}")]
    StatusNotUpdated { id: String, status: SubmissionStatus },
}

pub struct OfflineSubmissionQueue {
    store: Arc<dyn SubmissionStore>,
    /// Advisory connectivity flag. Does not gate `enqueue`.
    online: AtomicBool,
}

impl OfflineSubmissionQueue {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self {
            store,
            online: AtomicBool::new(true),
        }
    }

    /// Persist a new pending submission.
    ///
    /// Returns the record only once the store has confirmed the write.
    pub fn enqueue(&self, payload: impl Into<String>) -> Result<Submission, QueueError> {
        let submission = Submission::new_pending(payload);
        if !self.store.insert_new(&submission)? {
            return Err(QueueError::Storage(StorageError::Storage(format!(
                "submission id {} already exists",
                submission.id
            ))));
        }
        info!(submission_id = %submission.id, online = self.is_online(), "Submission enqueued");
        Ok(submission)
    }

    /// Pending submissions, oldest first.
    pub fn list_pending(&self) -> Result<Vec<Submission>, QueueError> {
        Ok(self.store.pending()?)
    }

    pub fn by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>, QueueError> {
        Ok(self.store.by_status(status)?)
    }

    pub fn get(&self, id: &str) -> Result<Option<Submission>, QueueError> {
        Ok(self.store.get(id)?)
    }

    pub fn mark_sent(&self, id: &str) -> bool {
        self.transition(id, SubmissionStatus::Sent)
    }

    pub fn mark_failed(&self, id: &str) -> bool {
        self.transition(id, SubmissionStatus::Failed)
    }

    /// Move `id` to `next` if the status machine allows it.
    ///
    /// True if the record now has status `next` (including when it already
    /// had it). False for unknown ids, illegal transitions, or storage errors.
    fn transition(&self, id: &str, next: SubmissionStatus) -> bool {
        let current = match self.store.get(id) {
            Ok(Some(submission)) => submission.status,
            Ok(None) => {
                debug!(submission_id = %id, "Unknown submission id");
                return false;
            }
            Err(e) => {
                warn!(submission_id = %id, error = %e, "Failed to read submission");
                return false;
            }
        };
        if current == next {
            return true;
        }
        if !current.can_transition_to(next) {
            debug!(submission_id = %id, from = %current, to = %next, "Illegal submission transition ignored");
            return false;
        }

        match self.store.compare_and_set_status(id, current, next) {
            Ok(true) => {
                info!(submission_id = %id, status = %next, "Submission status changed");
                true
            }
            // Lost the race: only a success if the winner picked the same status.
            Ok(false) => matches!(self.store.get(id), Ok(Some(s)) if s.status == next),
            Err(e) => {
                warn!(submission_id = %id, status = %next, error = %e, "Failed to update submission status");
                false
            }
        }
    }

    /// Enqueue a fresh pending copy of a failed submission.
    pub fn resubmit(&self, failed_id: &str) -> Result<Submission, QueueError> {
        let original = self
            .store
            .get(failed_id)?
            .ok_or_else(|| QueueError::NotFound(failed_id.to_string()))?;
        if original.status != SubmissionStatus::Failed {
            return Err(QueueError::NotResubmittable {
                id: original.id,
                status: original.status,
            });
        }
        let fresh = self.enqueue(original.payload)?;
        info!(submission_id = %fresh.id, resubmitted_from = %failed_id, "Submission resubmitted");
        Ok(fresh)
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            info!(online, "Queue connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
