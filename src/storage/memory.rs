//! In-memory store for testing and minimal deployments
//!
//! Thread-safe via `RwLock`. Not durable: data is lost on restart.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{
    sort_newest_first, sort_oldest_first, IncidentStore, RouteStore, StorageError,
    SubmissionStore,
};
use crate::model::{Incident, SavedRoute, Submission, SubmissionStatus};

#[derive(Default)]
pub struct InMemoryStore {
    incidents: RwLock<HashMap<String, Incident>>,
    submissions: RwLock<HashMap<String, Submission>>,
    routes: RwLock<HashMap<String, SavedRoute>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: PoisonError<T>) -> StorageError {
    StorageError::Storage(e.to_string())
}

impl IncidentStore for InMemoryStore {
    fn all(&self) -> Result<Vec<Incident>, StorageError> {
        let store = self.incidents.read().map_err(poisoned)?;
        let mut incidents: Vec<Incident> = store.values().cloned().collect();
        sort_newest_first(&mut incidents);
        Ok(incidents)
    }

    fn get(&self, id: &str) -> Result<Option<Incident>, StorageError> {
        let store = self.incidents.read().map_err(poisoned)?;
        Ok(store.get(id).cloned())
    }

    fn save(&self, incident: &Incident) -> Result<(), StorageError> {
        let mut store = self.incidents.write().map_err(poisoned)?;
        store.insert(incident.id.clone(), incident.clone());
        Ok(())
    }

    fn insert_new(&self, incident: &Incident) -> Result<bool, StorageError> {
        let mut store = self.incidents.write().map_err(poisoned)?;
        if store.contains_key(&incident.id) {
            return Ok(false);
        }
        store.insert(incident.id.clone(), incident.clone());
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut store = self.incidents.write().map_err(poisoned)?;
        Ok(store.remove(id).is_some())
    }
}

impl SubmissionStore for InMemoryStore {
    fn insert_new(&self, submission: &Submission) -> Result<bool, StorageError> {
        let mut store = self.submissions.write().map_err(poisoned)?;
        if store.contains_key(&submission.id) {
            return Ok(false);
        }
        store.insert(submission.id.clone(), submission.clone());
        Ok(true)
    }

    fn get(&self, id: &str) -> Result<Option<Submission>, StorageError> {
        let store = self.submissions.read().map_err(poisoned)?;
        Ok(store.get(id).cloned())
    }

    fn by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>, StorageError> {
        let store = self.submissions.read().map_err(poisoned)?;
        let mut matching: Vec<Submission> = store
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        sort_oldest_first(&mut matching);
        Ok(matching)
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: SubmissionStatus,
        next: SubmissionStatus,
    ) -> Result<bool, StorageError> {
        let mut store = self.submissions.write().map_err(poisoned)?;
        match store.get_mut(id) {
            Some(sub) if sub.status == expected => {
                sub.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut store = self.submissions.write().map_err(poisoned)?;
        Ok(store.remove(id).is_some())
    }
}

impl RouteStore for InMemoryStore {
    fn for_user(&self, user_id: &str) -> Result<Vec<SavedRoute>, StorageError> {
        let store = self.routes.read().map_err(poisoned)?;
        let mut routes: Vec<SavedRoute> = store
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        routes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(routes)
    }

    fn get(&self, id: &str) -> Result<Option<SavedRoute>, StorageError> {
        let store = self.routes.read().map_err(poisoned)?;
        Ok(store.get(id).cloned())
    }

    fn save(&self, route: &SavedRoute) -> Result<(), StorageError> {
        let mut store = self.routes.write().map_err(poisoned)?;
        store.insert(route.id.clone(), route.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut store = self.routes.write().map_err(poisoned)?;
        Ok(store.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IncidentStatus, IncidentType, Severity};
    use chrono::{Duration, Utc};

    fn make_incident(id: &str, minutes_ago: i64, status: IncidentStatus) -> Incident {
        Incident {
            id: id.to_string(),
            incident_type: IncidentType::Hazard,
            severity: Severity::Low,
            location: "Ring Rd".to_string(),
            latitude: None,
            longitude: None,
            description: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            reporter_id: None,
            status,
            submission_id: None,
        }
    }

    #[test]
    fn incidents_list_newest_first() {
        let store = InMemoryStore::new();
        let incidents: &dyn IncidentStore = &store;
        incidents.save(&make_incident("old", 30, IncidentStatus::Confirmed)).unwrap();
        incidents.save(&make_incident("new", 1, IncidentStatus::Pending)).unwrap();

        let all = incidents.all().unwrap();
        assert_eq!(all[0].id, "new");
        assert_eq!(all[1].id, "old");

        let confirmed = incidents.by_status(IncidentStatus::Confirmed).unwrap();
        assert_eq!(confirmed.len(), 1);
        assert!(incidents.delete("old").unwrap());
        assert!(!incidents.delete("old").unwrap());
    }

    #[test]
    fn incident_insert_new_never_overwrites() {
        let store = InMemoryStore::new();
        let incidents: &dyn IncidentStore = &store;
        assert!(incidents.insert_new(&make_incident("inc_1", 5, IncidentStatus::Pending)).unwrap());
        assert!(!incidents.insert_new(&make_incident("inc_1", 0, IncidentStatus::Confirmed)).unwrap());
        assert_eq!(
            incidents.get("inc_1").unwrap().unwrap().status,
            IncidentStatus::Pending
        );
    }

    #[test]
    fn submission_insert_new_is_create_if_absent() {
        let store = InMemoryStore::new();
        let sub = Submission::new_pending("{}");
        assert!(SubmissionStore::insert_new(&store, &sub).unwrap());
        assert!(!SubmissionStore::insert_new(&store, &sub).unwrap());
    }

    #[test]
    fn compare_and_set_requires_expected_status() {
        let store = InMemoryStore::new();
        let sub = Submission::new_pending("{}");
        SubmissionStore::insert_new(&store, &sub).unwrap();

        assert!(!store
            .compare_and_set_status(&sub.id, SubmissionStatus::Sent, SubmissionStatus::Failed)
            .unwrap());
        assert!(store
            .compare_and_set_status(&sub.id, SubmissionStatus::Pending, SubmissionStatus::Sent)
            .unwrap());
        assert_eq!(
            SubmissionStore::get(&store, &sub.id).unwrap().unwrap().status,
            SubmissionStatus::Sent
        );
        assert!(!store
            .compare_and_set_status("nope", SubmissionStatus::Pending, SubmissionStatus::Sent)
            .unwrap());
    }

    #[test]
    fn trait_objects() {
        let store: Box<dyn SubmissionStore> = Box::new(InMemoryStore::new());
        store.insert_new(&Submission::new_pending("{}")).unwrap();
        assert_eq!(store.pending().unwrap().len(), 1);
    }
}
