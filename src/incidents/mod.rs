//! Incident service
//!
//! Create, read, update and delete incidents on top of an [`IncidentStore`],
//! with validation on every write and the query pipeline on every listing.
//! Incoming strings are sanitized before they are validated, so a location
//! that is nothing but angle brackets counts as blank.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::model::{
    generate_id, Incident, IncidentDraft, IncidentPatch, IncidentStatus, ParseLabelError,
    QuerySpec,
};
use crate::query::{FilterSessions, QueryPipeline};
use crate::storage::{IncidentStore, StorageError};
use crate::validation::{self, sanitize_string, ValidationReport};

#[derive(Debug, thiserror::Error)]
pub enum IncidentError {
    #[error("validation failed: {0}")]
    Validation(ValidationReport),
    #[error("incident not found: {0}")]
    NotFound(String),
    #[error("incident already exists: {0}")]
    AlreadyExists(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ParseLabelError> for IncidentError {
    fn from(err: ParseLabelError) -> Self {
        IncidentError::Validation(ValidationReport::from_errors(vec![err.to_string()]))
    }
}

pub struct IncidentService {
    store: Arc<dyn IncidentStore>,
    pipeline: QueryPipeline,
    sessions: FilterSessions,
}

impl IncidentService {
    pub fn new(store: Arc<dyn IncidentStore>) -> Self {
        Self {
            store,
            pipeline: QueryPipeline::new(),
            sessions: FilterSessions::new(),
        }
    }

    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    pub fn sessions(&self) -> &FilterSessions {
        &self.sessions
    }

    /// All stored incidents through filter → search → sort.
    pub fn list(&self, query: &QuerySpec) -> Result<Vec<Incident>, IncidentError> {
        let incidents = self.store.all()?;
        Ok(self.pipeline.run(incidents, query))
    }

    /// Like [`list`](Self::list), but the request's filter is first merged
    /// into the session's accumulated filter.
    pub fn list_for_session(
        &self,
        session: &str,
        request: &QuerySpec,
    ) -> Result<Vec<Incident>, IncidentError> {
        let active = self.sessions.merge(session, &request.filter);
        debug!(session = %session, filter = ?active, "Session filter merged");
        let query = QuerySpec {
            filter: active,
            ..request.clone()
        };
        self.list(&query)
    }

    pub fn get(&self, id: &str) -> Result<Incident, IncidentError> {
        self.store
            .get(id)?
            .ok_or_else(|| IncidentError::NotFound(id.to_string()))
    }

    pub fn by_status(&self, status: IncidentStatus) -> Result<Vec<Incident>, IncidentError> {
        Ok(self.store.by_status(status)?)
    }

    /// Validate and store a new incident. Assigns an `inc_` id when absent.
    ///
    /// Never replaces a stored record: a caller-supplied id that is already
    /// taken is `AlreadyExists`.
    pub fn create(&self, draft: IncidentDraft) -> Result<Incident, IncidentError> {
        let incident = build_incident(sanitize_draft(draft), None)?;
        if !self.store.insert_new(&incident)? {
            return Err(IncidentError::AlreadyExists(incident.id));
        }
        info!(id = %incident.id, incident_type = %incident.incident_type, severity = %incident.severity, "Incident created");
        Ok(incident)
    }

    /// Store a published submission as a confirmed incident.
    ///
    /// The incident id is derived from the submission id and any id or
    /// status in the payload is ignored. The reporter's timestamp is kept.
    /// Importing the same submission again returns the incident created the
    /// first time.
    pub fn import_confirmed(
        &self,
        mut draft: IncidentDraft,
        submission_id: &str,
    ) -> Result<Incident, IncidentError> {
        let id = imported_incident_id(submission_id);
        draft.id = Some(id.clone());
        draft.status = Some(IncidentStatus::Confirmed);
        let incident = build_incident(sanitize_draft(draft), Some(submission_id.to_string()))?;

        if self.store.insert_new(&incident)? {
            info!(id = %incident.id, submission_id = %submission_id, "Imported confirmed incident");
            return Ok(incident);
        }
        match self.store.get(&id)? {
            Some(existing) if existing.submission_id.as_deref() == Some(submission_id) => {
                debug!(id = %id, submission_id = %submission_id, "Submission already imported");
                Ok(existing)
            }
            _ => Err(IncidentError::AlreadyExists(id)),
        }
    }

    /// Merge `patch` into the stored incident, re-validate, and save.
    pub fn update(&self, id: &str, patch: IncidentPatch) -> Result<Incident, IncidentError> {
        let existing = self.get(id)?;
        let mut draft = IncidentDraft::from(&existing);
        let clear_errors = patch.apply(&mut draft);
        let draft = sanitize_draft(draft);

        if !clear_errors.is_empty() {
            let mut errors = clear_errors;
            errors.extend(validation::validate(&draft).errors);
            return Err(IncidentError::Validation(ValidationReport::from_errors(errors)));
        }

        let updated = build_incident(draft, existing.submission_id.clone())?;
        self.store.save(&updated)?;
        debug!(id = %id, "Incident updated");
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<(), IncidentError> {
        if self.store.delete(id)? {
            info!(id = %id, "Incident deleted");
            Ok(())
        } else {
            Err(IncidentError::NotFound(id.to_string()))
        }
    }
}

/// `sub_<x>` imports as `inc_<x>`.
fn imported_incident_id(submission_id: &str) -> String {
    let suffix = submission_id.strip_prefix("sub_").unwrap_or(submission_id);
    format!("inc_{suffix}")
}

fn sanitize_draft(mut draft: IncidentDraft) -> IncidentDraft {
    draft.location = draft.location.as_deref().map(sanitize_string);
    draft.description = draft.description.as_deref().map(sanitize_string);
    draft.reporter_id = draft.reporter_id.as_deref().map(sanitize_string);
    draft
}

fn build_incident(
    draft: IncidentDraft,
    submission_id: Option<String>,
) -> Result<Incident, IncidentError> {
    let report = validation::validate(&draft);
    if !report.valid {
        return Err(IncidentError::Validation(report));
    }

    let incident_type = draft.incident_type.as_deref().unwrap_or_default().parse()?;
    let severity = draft.severity.as_deref().unwrap_or_default().parse()?;

    Ok(Incident {
        id: draft.id.unwrap_or_else(|| generate_id("inc")),
        incident_type,
        severity,
        location: draft.location.unwrap_or_default(),
        latitude: draft.latitude,
        longitude: draft.longitude,
        description: draft.description,
        timestamp: draft.timestamp.unwrap_or_else(Utc::now),
        reporter_id: draft.reporter_id,
        status: draft.status.unwrap_or_default(),
        submission_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FilterSpec, IncidentType, Severity};
    use crate::storage::InMemoryStore;

    fn service() -> IncidentService {
        IncidentService::new(Arc::new(InMemoryStore::new()))
    }

    fn draft(kind: &str, severity: &str, location: &str) -> IncidentDraft {
        IncidentDraft {
            incident_type: Some(kind.to_string()),
            severity: Some(severity.to_string()),
            location: Some(location.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn create_assigns_id_and_sanitizes() {
        let svc = service();
        let created = svc.create(draft("Accident", "HIGH", "  <Main St>  ")).unwrap();
        assert!(created.id.starts_with("inc_"));
        assert_eq!(created.location, "Main St");
        assert_eq!(created.incident_type, IncidentType::Accident);
        assert_eq!(created.severity, Severity::High);
        assert_eq!(created.status, IncidentStatus::Pending);
        assert_eq!(svc.get(&created.id).unwrap(), created);
    }

    #[test]
    fn create_keeps_caller_id() {
        let svc = service();
        let mut d = draft("hazard", "low", "Ring Rd");
        d.id = Some("custom-1".to_string());
        assert_eq!(svc.create(d.clone()).unwrap().id, "custom-1");

        d.location = Some("Elsewhere".to_string());
        assert!(matches!(svc.create(d), Err(IncidentError::AlreadyExists(id)) if id == "custom-1"));
        assert_eq!(svc.get("custom-1").unwrap().location, "Ring Rd");
    }

    #[test]
    fn create_rejects_with_every_error() {
        let svc = service();
        let err = svc.create(draft("flood", "extreme", "<>")).unwrap_err();
        match err {
            IncidentError::Validation(report) => assert_eq!(report.errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
        assert!(svc.list(&QuerySpec::default()).unwrap().is_empty());
    }

    #[test]
    fn update_merges_and_revalidates() {
        let svc = service();
        let mut d = draft("closure", "medium", "Bridge");
        d.description = Some("both lanes".to_string());
        d.latitude = Some(10.0);
        let created = svc.create(d).unwrap();

        let patch: IncidentPatch =
            serde_json::from_str(r#"{"severity": "critical", "latitude": null}"#).unwrap();
        let updated = svc.update(&created.id, patch).unwrap();
        assert_eq!(updated.severity, Severity::Critical);
        assert_eq!(updated.latitude, None);
        assert_eq!(updated.description.as_deref(), Some("both lanes"));
        assert_eq!(updated.timestamp, created.timestamp);

        let bad: IncidentPatch = serde_json::from_str(r#"{"longitude": 200.0}"#).unwrap();
        assert!(matches!(
            svc.update(&created.id, bad),
            Err(IncidentError::Validation(_))
        ));
        assert_eq!(svc.get(&created.id).unwrap().severity, Severity::Critical);
    }

    #[test]
    fn update_refuses_clearing_required_field() {
        let svc = service();
        let created = svc.create(draft("closure", "medium", "Bridge")).unwrap();
        let patch: IncidentPatch = serde_json::from_str(r#"{"type": null}"#).unwrap();
        match svc.update(&created.id, patch) {
            Err(IncidentError::Validation(report)) => {
                assert!(report.errors.iter().any(|e| e.contains("'type'")));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let svc = service();
        assert!(matches!(svc.get("nope"), Err(IncidentError::NotFound(_))));
        assert!(matches!(svc.delete("nope"), Err(IncidentError::NotFound(_))));
        assert!(matches!(
            svc.update("nope", IncidentPatch::default()),
            Err(IncidentError::NotFound(_))
        ));
    }

    #[test]
    fn import_confirmed_tags_submission() {
        let svc = service();
        let imported = svc
            .import_confirmed(draft("hazard", "low", "Ring Rd"), "sub_1")
            .unwrap();
        assert_eq!(imported.status, IncidentStatus::Confirmed);
        assert_eq!(imported.submission_id.as_deref(), Some("sub_1"));
        assert_eq!(svc.by_status(IncidentStatus::Confirmed).unwrap().len(), 1);
    }

    #[test]
    fn import_ignores_payload_id_and_status() {
        let svc = service();
        let existing = svc.create(draft("accident", "critical", "Main St")).unwrap();

        let mut payload = draft("hazard", "low", "nothing here");
        payload.id = Some(existing.id.clone());
        payload.status = Some(IncidentStatus::Rejected);
        let imported = svc.import_confirmed(payload, "sub_abc").unwrap();

        assert_eq!(imported.id, "inc_abc");
        assert_eq!(imported.status, IncidentStatus::Confirmed);
        let untouched = svc.get(&existing.id).unwrap();
        assert_eq!(untouched, existing);
        assert_eq!(svc.list(&QuerySpec::default()).unwrap().len(), 2);
    }

    #[test]
    fn reimport_returns_first_incident() {
        let svc = service();
        let first = svc
            .import_confirmed(draft("hazard", "low", "Ring Rd"), "sub_1")
            .unwrap();
        let again = svc
            .import_confirmed(draft("closure", "high", "Other"), "sub_1")
            .unwrap();
        assert_eq!(again, first);
        assert_eq!(svc.list(&QuerySpec::default()).unwrap().len(), 1);
    }

    #[test]
    fn import_never_takes_over_foreign_record() {
        let svc = service();
        let mut d = draft("hazard", "low", "Ring Rd");
        d.id = Some("inc_7".to_string());
        svc.create(d).unwrap();

        assert!(matches!(
            svc.import_confirmed(draft("closure", "high", "Tunnel"), "sub_7"),
            Err(IncidentError::AlreadyExists(_))
        ));
        assert_eq!(svc.get("inc_7").unwrap().location, "Ring Rd");
    }

    #[test]
    fn session_filters_accumulate() {
        let svc = service();
        svc.create(draft("hazard", "low", "A")).unwrap();
        svc.create(draft("hazard", "high", "B")).unwrap();
        svc.create(draft("accident", "high", "C")).unwrap();

        let by_type = QuerySpec {
            filter: FilterSpec {
                incident_type: Some(IncidentType::Hazard),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(svc.list_for_session("s1", &by_type).unwrap().len(), 2);

        let by_severity = QuerySpec {
            filter: FilterSpec {
                severity: Some(Severity::High),
                ..Default::default()
            },
            ..Default::default()
        };
        let out = svc.list_for_session("s1", &by_severity).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location, "B");

        // Another session starts clean.
        assert_eq!(svc.list_for_session("s2", &by_severity).unwrap().len(), 2);
    }
}
