//! Durable store on Sled DB
//!
//! One database, one tree per record kind (`incidents`, `submissions`,
//! `routes`). Keys are record ids, values JSON. Create-if-absent and status
//! transitions go through sled's compare-and-swap so concurrent callers on
//! the same id cannot both win.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::{
    sort_newest_first, sort_oldest_first, IncidentStore, RouteStore, StorageError,
    SubmissionStore,
};
use crate::model::{Incident, SavedRoute, Submission, SubmissionStatus};

#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
    incidents: sled::Tree,
    submissions: sled::Tree,
    routes: sled::Tree,
}

impl SledStore {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let store = Self {
            incidents: db.open_tree("incidents")?,
            submissions: db.open_tree("submissions")?,
            routes: db.open_tree("routes")?,
            db: Arc::new(db),
        };

        tracing::info!(
            path = ?path_ref,
            incidents = store.incidents.len(),
            submissions = store.submissions.len(),
            "Sled store opened"
        );

        Ok(store)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

/// Decode every value in a tree, skipping corrupted entries.
fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, StorageError> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (key, value) = item?;
        match serde_json::from_slice::<T>(&value) {
            Ok(record) => out.push(record),
            Err(e) => {
                tracing::warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping corrupted entry"
                );
            }
        }
    }
    Ok(out)
}

fn read<T: DeserializeOwned>(tree: &sled::Tree, id: &str) -> Result<Option<T>, StorageError> {
    match tree.get(id.as_bytes())? {
        Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
        None => Ok(None),
    }
}

fn write<T: Serialize>(tree: &sled::Tree, id: &str, record: &T) -> Result<(), StorageError> {
    let value = serde_json::to_vec(record)?;
    tree.insert(id.as_bytes(), value)?;
    Ok(())
}

fn remove(tree: &sled::Tree, id: &str) -> Result<bool, StorageError> {
    Ok(tree.remove(id.as_bytes())?.is_some())
}

impl IncidentStore for SledStore {
    fn all(&self) -> Result<Vec<Incident>, StorageError> {
        let mut incidents: Vec<Incident> = scan(&self.incidents)?;
        sort_newest_first(&mut incidents);
        Ok(incidents)
    }

    fn get(&self, id: &str) -> Result<Option<Incident>, StorageError> {
        read(&self.incidents, id)
    }

    fn save(&self, incident: &Incident) -> Result<(), StorageError> {
        write(&self.incidents, &incident.id, incident)?;
        tracing::debug!(id = %incident.id, status = %incident.status, "Stored incident");
        Ok(())
    }

    fn insert_new(&self, incident: &Incident) -> Result<bool, StorageError> {
        let value = serde_json::to_vec(incident)?;
        let swapped =
            self.incidents
                .compare_and_swap(incident.id.as_bytes(), None::<&[u8]>, Some(value))?;
        Ok(swapped.is_ok())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        remove(&self.incidents, id)
    }
}

impl SubmissionStore for SledStore {
    fn insert_new(&self, submission: &Submission) -> Result<bool, StorageError> {
        let value = serde_json::to_vec(submission)?;
        let swapped = self.submissions.compare_and_swap(
            submission.id.as_bytes(),
            None::<&[u8]>,
            Some(value),
        )?;
        Ok(swapped.is_ok())
    }

    fn get(&self, id: &str) -> Result<Option<Submission>, StorageError> {
        read(&self.submissions, id)
    }

    fn by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>, StorageError> {
        let mut matching: Vec<Submission> = scan::<Submission>(&self.submissions)?
            .into_iter()
            .filter(|s| s.status == status)
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
        loop {
            let Some(current) = self.submissions.get(id.as_bytes())? else {
                return Ok(false);
            };
            let mut submission: Submission = serde_json::from_slice(&current)?;
            if submission.status != expected {
                return Ok(false);
            }
            submission.status = next;
            let updated = serde_json::to_vec(&submission)?;

            match self
                .submissions
                .compare_and_swap(id.as_bytes(), Some(&current), Some(updated))?
            {
                Ok(()) => return Ok(true),
                // Raced with another writer; re-read and re-check.
                Err(_) => continue,
            }
        }
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        remove(&self.submissions, id)
    }
}

impl RouteStore for SledStore {
    fn for_user(&self, user_id: &str) -> Result<Vec<SavedRoute>, StorageError> {
        let mut routes: Vec<SavedRoute> = scan::<SavedRoute>(&self.routes)?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect();
        routes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(routes)
    }

    fn get(&self, id: &str) -> Result<Option<SavedRoute>, StorageError> {
        read(&self.routes, id)
    }

    fn save(&self, route: &SavedRoute) -> Result<(), StorageError> {
        write(&self.routes, &route.id, route)
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        remove(&self.routes, id)
    }
}
