//! Publishing queued submissions as confirmed incidents
//!
//! A publish holds an in-process claim on the submission id for its whole
//! duration, so concurrent publishes of one submission import it once. The
//! import itself is create-if-absent under an id derived from the
//! submission, so retrying after a failed status write reuses the incident
//! instead of creating another.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{OfflineSubmissionQueue, QueueError};
use crate::incidents::IncidentService;
use crate::model::{IncidentDraft, SubmissionStatus};

/// Result of publishing one submission
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PublishOutcome {
    /// Imported; the submission is now `sent`.
    Sent {
        #[serde(rename = "incidentId")]
        incident_id: String,
    },
    /// Payload unusable or import failed; the submission is now `failed`.
    Failed { reason: String },
    /// Already terminal, nothing done.
    Skipped { status: SubmissionStatus },
    /// Another caller is publishing this submission right now.
    InProgress,
}

/// Totals from a [`SubmissionPublisher::publish_all`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Releases a publish claim on drop.
struct Claim<'a> {
    claims: &'a DashMap<String, ()>,
    id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.claims.remove(&self.id);
    }
}

pub struct SubmissionPublisher {
    queue: Arc<OfflineSubmissionQueue>,
    incidents: Arc<IncidentService>,
    claims: DashMap<String, ()>,
}

impl SubmissionPublisher {
    pub fn new(queue: Arc<OfflineSubmissionQueue>, incidents: Arc<IncidentService>) -> Self {
        Self {
            queue,
            incidents,
            claims: DashMap::new(),
        }
    }

    fn claim(&self, id: &str) -> Option<Claim<'_>> {
        match self.claims.entry(id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Claim {
                    claims: &self.claims,
                    id: id.to_string(),
                })
            }
        }
    }

    /// Import one pending submission and mark it sent or failed.
    ///
    /// Errors with `StatusNotUpdated` if the incident was handled but the
    /// submission's new status could not be stored; the submission then
    /// stays pending and a later publish finishes the job.
    pub fn publish(&self, id: &str) -> Result<PublishOutcome, QueueError> {
        let Some(_claim) = self.claim(id) else {
            debug!(submission_id = %id, "Publish already in progress");
            return Ok(PublishOutcome::InProgress);
        };

        let submission = self
            .queue
            .get(id)?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        if submission.status.is_terminal() {
            return Ok(PublishOutcome::Skipped {
                status: submission.status,
            });
        }

        let imported = serde_json::from_str::<IncidentDraft>(&submission.payload)
            .map_err(|e| QueueError::Payload(e.to_string()).to_string())
            .and_then(|draft| {
                self.incidents
                    .import_confirmed(draft, &submission.id)
                    .map_err(|e| e.to_string())
            });

        let (next, outcome) = match imported {
            Ok(incident) => (
                SubmissionStatus::Sent,
                PublishOutcome::Sent {
                    incident_id: incident.id,
                },
            ),
            Err(reason) => {
                warn!(submission_id = %submission.id, reason = %reason, "Publish failed");
                (SubmissionStatus::Failed, PublishOutcome::Failed { reason })
            }
        };

        let marked = match next {
            SubmissionStatus::Sent => self.queue.mark_sent(&submission.id),
            _ => self.queue.mark_failed(&submission.id),
        };
        if !marked {
            return Err(QueueError::StatusNotUpdated {
                id: submission.id,
                status: next,
            });
        }
        Ok(outcome)
    }

    /// Publish every pending submission, oldest first.
    pub fn publish_all(&self) -> Result<PublishSummary, QueueError> {
        let pending = self.queue.list_pending()?;
        let mut summary = PublishSummary {
            total: pending.len(),
            ..Default::default()
        };

        for submission in pending {
            match self.publish(&submission.id)? {
                PublishOutcome::Sent { .. } => summary.processed += 1,
                PublishOutcome::Failed { .. } => summary.failed += 1,
                PublishOutcome::Skipped { .. } | PublishOutcome::InProgress => {}
            }
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            total = summary.total,
            "Queue processed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Incident, IncidentStatus, QuerySpec, Submission};
    use crate::storage::{IncidentStore, InMemoryStore, StorageError, SubmissionStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Incident store whose inserts take a while, to widen race windows.
    struct SlowIncidents(InMemoryStore);

    impl IncidentStore for SlowIncidents {
        fn all(&self) -> Result<Vec<Incident>, StorageError> {
            IncidentStore::all(&self.0)
        }
        fn get(&self, id: &str) -> Result<Option<Incident>, StorageError> {
            IncidentStore::get(&self.0, id)
        }
        fn save(&self, incident: &Incident) -> Result<(), StorageError> {
            IncidentStore::save(&self.0, incident)
        }
        fn insert_new(&self, incident: &Incident) -> Result<bool, StorageError> {
            std::thread::sleep(Duration::from_millis(100));
            IncidentStore::insert_new(&self.0, incident)
        }
        fn delete(&self, id: &str) -> Result<bool, StorageError> {
            IncidentStore::delete(&self.0, id)
        }
    }

    /// Submission store whose status writes can be made to fail.
    #[derive(Default)]
    struct FlakyStatus {
        inner: InMemoryStore,
        failing: AtomicBool,
    }

    impl SubmissionStore for FlakyStatus {
        fn insert_new(&self, submission: &Submission) -> Result<bool, StorageError> {
            SubmissionStore::insert_new(&self.inner, submission)
        }
        fn get(&self, id: &str) -> Result<Option<Submission>, StorageError> {
            SubmissionStore::get(&self.inner, id)
        }
        fn by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>, StorageError> {
            SubmissionStore::by_status(&self.inner, status)
        }
        fn compare_and_set_status(
            &self,
            id: &str,
            expected: SubmissionStatus,
            next: SubmissionStatus,
        ) -> Result<bool, StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Storage("disk full".to_string()));
            }
            self.inner.compare_and_set_status(id, expected, next)
        }
        fn delete(&self, id: &str) -> Result<bool, StorageError> {
            SubmissionStore::delete(&self.inner, id)
        }
    }

    fn publisher() -> (SubmissionPublisher, Arc<OfflineSubmissionQueue>, Arc<IncidentService>) {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(OfflineSubmissionQueue::new(store.clone()));
        let incidents = Arc::new(IncidentService::new(store));
        (
            SubmissionPublisher::new(queue.clone(), incidents.clone()),
            queue,
            incidents,
        )
    }

    #[test]
    fn valid_payload_becomes_confirmed_incident() {
        let (publisher, queue, incidents) = publisher();
        let sub = queue
            .enqueue(r#"{"type":"accident","severity":"high","location":"A1 northbound"}"#)
            .unwrap();

        let outcome = publisher.publish(&sub.id).unwrap();
        let PublishOutcome::Sent { incident_id } = outcome else {
            panic!("expected Sent, got {outcome:?}");
        };
        let incident = incidents.get(&incident_id).unwrap();
        assert_eq!(incident.status, IncidentStatus::Confirmed);
        assert_eq!(incident.submission_id.as_deref(), Some(sub.id.as_str()));
        assert_eq!(queue.get(&sub.id).unwrap().unwrap().status, SubmissionStatus::Sent);

        assert_eq!(
            publisher.publish(&sub.id).unwrap(),
            PublishOutcome::Skipped {
                status: SubmissionStatus::Sent
            }
        );
    }

    #[test]
    fn bad_payloads_are_marked_failed() {
        let (publisher, queue, incidents) = publisher();
        let garbage = queue.enqueue("not json").unwrap();
        let invalid = queue
            .enqueue(r#"{"type":"flood","severity":"high","location":"A1"}"#)
            .unwrap();

        assert!(matches!(
            publisher.publish(&garbage.id).unwrap(),
            PublishOutcome::Failed { .. }
        ));
        assert!(matches!(
            publisher.publish(&invalid.id).unwrap(),
            PublishOutcome::Failed { .. }
        ));
        assert_eq!(queue.by_status(SubmissionStatus::Failed).unwrap().len(), 2);
        assert!(incidents.list(&QuerySpec::default()).unwrap().is_empty());
    }

    #[test]
    fn publish_all_reports_totals() {
        let (publisher, queue, _) = publisher();
        queue
            .enqueue(r#"{"type":"hazard","severity":"low","location":"Ring Rd"}"#)
            .unwrap();
        queue.enqueue("{}").unwrap();

        let summary = publisher.publish_all().unwrap();
        assert_eq!(
            summary,
            PublishSummary {
                processed: 1,
                failed: 1,
                total: 2
            }
        );
        assert!(queue.list_pending().unwrap().is_empty());
    }

    #[test]
    fn concurrent_publish_imports_once() {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(OfflineSubmissionQueue::new(store));
        let incidents = Arc::new(IncidentService::new(Arc::new(SlowIncidents(
            InMemoryStore::new(),
        ))));
        let publisher = Arc::new(SubmissionPublisher::new(queue.clone(), incidents.clone()));
        let sub = queue
            .enqueue(r#"{"type":"closure","severity":"high","location":"Tunnel North"}"#)
            .unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let publisher = publisher.clone();
                let id = sub.id.clone();
                std::thread::spawn(move || publisher.publish(&id).unwrap())
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let sent = outcomes
            .iter()
            .filter(|o| matches!(o, PublishOutcome::Sent { .. }))
            .count();
        assert_eq!(sent, 1, "outcomes: {outcomes:?}");
        assert_eq!(incidents.by_status(IncidentStatus::Confirmed).unwrap().len(), 1);
        assert_eq!(queue.get(&sub.id).unwrap().unwrap().status, SubmissionStatus::Sent);
    }

    #[test]
    fn payload_cannot_overwrite_existing_incident() {
        let (publisher, queue, incidents) = publisher();
        let existing = incidents
            .create(IncidentDraft {
                incident_type: Some("accident".to_string()),
                severity: Some("critical".to_string()),
                location: Some("Main St".to_string()),
                ..Default::default()
            })
            .unwrap();
        let sub = queue
            .enqueue(format!(
                r#"{{"id":"{}","type":"hazard","severity":"low","location":"nothing here"}}"#,
                existing.id
            ))
            .unwrap();

        let PublishOutcome::Sent { incident_id } = publisher.publish(&sub.id).unwrap() else {
            panic!("expected Sent");
        };
        assert_ne!(incident_id, existing.id);
        assert_eq!(incidents.get(&existing.id).unwrap(), existing);
        assert_eq!(incidents.list(&QuerySpec::default()).unwrap().len(), 2);
    }

    #[test]
    fn unsaved_status_is_an_error_and_retry_reuses_incident() {
        let statuses = Arc::new(FlakyStatus::default());
        let queue = Arc::new(OfflineSubmissionQueue::new(statuses.clone()));
        let incidents = Arc::new(IncidentService::new(Arc::new(InMemoryStore::new())));
        let publisher = SubmissionPublisher::new(queue.clone(), incidents.clone());
        let sub = queue
            .enqueue(r#"{"type":"hazard","severity":"low","location":"Ring Rd"}"#)
            .unwrap();

        statuses.failing.store(true, Ordering::SeqCst);
        assert!(matches!(
            publisher.publish(&sub.id),
            Err(QueueError::StatusNotUpdated { status: SubmissionStatus::Sent, .. })
        ));
        assert_eq!(queue.list_pending().unwrap().len(), 1);

        statuses.failing.store(false, Ordering::SeqCst);
        let PublishOutcome::Sent { incident_id } = publisher.publish(&sub.id).unwrap() else {
            panic!("expected Sent");
        };
        let all = incidents.list(&QuerySpec::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, incident_id);
        assert!(queue.list_pending().unwrap().is_empty());
    }

    #[test]
    fn unknown_submission_is_not_found() {
        let (publisher, _, _) = publisher();
        assert!(matches!(publisher.publish("nope"), Err(QueueError::NotFound(_))));
    }
}
