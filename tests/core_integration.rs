//! Core integration tests
//!
//! Services wired over the durable sled store the way the binary wires them,
//! without the HTTP layer.

use roadwatch::admission::{ManualClock, SubmissionAdmission};
use roadwatch::incidents::IncidentService;
use roadwatch::model::{IncidentDraft, IncidentStatus, SubmissionStatus};
use roadwatch::queue::{OfflineSubmissionQueue, PublishOutcome, SubmissionPublisher};
use roadwatch::storage::SledStore;

use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn draft(location: &str) -> IncidentDraft {
    IncidentDraft {
        incident_type: Some("accident".to_string()),
        severity: Some("high".to_string()),
        location: Some(location.to_string()),
        ..Default::default()
    }
}

fn services(store: Arc<SledStore>) -> (Arc<OfflineSubmissionQueue>, Arc<IncidentService>, SubmissionPublisher) {
    let queue = Arc::new(OfflineSubmissionQueue::new(store.clone()));
    let incidents = Arc::new(IncidentService::new(store));
    let publisher = SubmissionPublisher::new(queue.clone(), incidents.clone());
    (queue, incidents, publisher)
}

#[test]
fn pending_submissions_survive_restart() {
    let dir = TempDir::new().unwrap();
    let payload = serde_json::to_string(&draft("Bridge Rd")).unwrap();

    let id = {
        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        let (queue, _, _) = services(store.clone());
        let sub = queue.enqueue(payload).unwrap();
        store.flush().unwrap();
        sub.id
    };

    let store = Arc::new(SledStore::open(dir.path()).unwrap());
    let (queue, incidents, publisher) = services(store);
    let pending = queue.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);

    let outcome = publisher.publish(&id).unwrap();
    let PublishOutcome::Sent { incident_id } = outcome else {
        panic!("expected sent, got {outcome:?}");
    };
    let incident = incidents.get(&incident_id).unwrap();
    assert_eq!(incident.status, IncidentStatus::Confirmed);
    assert_eq!(incident.submission_id.as_deref(), Some(id.as_str()));
    assert_eq!(queue.get(&id).unwrap().unwrap().status, SubmissionStatus::Sent);
}

#[test]
fn unreadable_payload_fails_and_can_be_resubmitted() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledStore::open(dir.path()).unwrap());
    let (queue, _, publisher) = services(store);

    let sub = queue.enqueue("not json").unwrap();
    assert!(matches!(
        publisher.publish(&sub.id).unwrap(),
        PublishOutcome::Failed { .. }
    ));
    assert_eq!(queue.get(&sub.id).unwrap().unwrap().status, SubmissionStatus::Failed);

    let fresh = assert_ok!(queue.resubmit(&sub.id));
    // The fresh copy is pending, so it cannot be resubmitted again.
    assert_err!(queue.resubmit(&fresh.id));
    assert_ne!(fresh.id, sub.id);
    assert_eq!(fresh.status, SubmissionStatus::Pending);
    assert_eq!(fresh.payload, "not json");
}

#[test]
fn admission_window_rolls_over_on_manual_clock() {
    let clock = Arc::new(ManualClock::new(1_000));
    let admission = SubmissionAdmission::with_clock(2, 1_000, clock.clone());

    assert!(admission.can_submit("driver"));
    assert!(admission.can_submit("driver"));
    assert!(!admission.can_submit("driver"));

    // Exactly one window later is still the same window.
    clock.advance(1_000);
    assert!(!admission.can_submit("driver"));

    clock.advance(1);
    assert!(admission.can_submit("driver"));
    assert_eq!(admission.window("driver").unwrap().count, 1);
}
