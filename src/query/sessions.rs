//! Per-session accumulated filter state
//!
//! Clients that want filters to stick across requests name a session key;
//! each request's predicates are merged into that session's active filter.
//! Sessions never see each other's state.

use dashmap::DashMap;

use crate::model::{FilterField, FilterSpec};

#[derive(Debug, Default)]
pub struct FilterSessions {
    active: DashMap<String, FilterSpec>,
}

impl FilterSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `filter` into the session's active filter and return the result.
    pub fn merge(&self, session: &str, filter: &FilterSpec) -> FilterSpec {
        let mut entry = self.active.entry(session.to_string()).or_default();
        entry.merge(filter);
        entry.clone()
    }

    /// Replace a single predicate, leaving the others in place.
    pub fn set_predicate(&self, session: &str, field: FilterField, value: &str) -> Result<FilterSpec, crate::model::ParseLabelError> {
        let mut patch = FilterSpec::default();
        match field {
            FilterField::Type => patch.incident_type = Some(value.parse()?),
            FilterField::Severity => patch.severity = Some(value.parse()?),
            FilterField::Status => patch.status = Some(value.parse()?),
        }
        Ok(self.merge(session, &patch))
    }

    pub fn remove_predicate(&self, session: &str, field: FilterField) -> FilterSpec {
        match self.active.get_mut(session) {
            Some(mut entry) => {
                entry.remove(field);
                entry.clone()
            }
            None => FilterSpec::default(),
        }
    }

    /// Drop the session entirely. Returns false if it was not tracked.
    pub fn clear(&self, session: &str) -> bool {
        self.active.remove(session).is_some()
    }

    pub fn active(&self, session: &str) -> FilterSpec {
        self.active
            .get(session)
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IncidentStatus, IncidentType, Severity};

    #[test]
    fn merges_across_calls() {
        let sessions = FilterSessions::new();
        sessions.merge(
            "s1",
            &FilterSpec {
                incident_type: Some(IncidentType::Closure),
                ..Default::default()
            },
        );
        let active = sessions.merge(
            "s1",
            &FilterSpec {
                severity: Some(Severity::High),
                ..Default::default()
            },
        );
        assert_eq!(active.incident_type, Some(IncidentType::Closure));
        assert_eq!(active.severity, Some(Severity::High));
    }

    #[test]
    fn sessions_are_isolated() {
        let sessions = FilterSessions::new();
        sessions
            .set_predicate("s1", FilterField::Status, "confirmed")
            .unwrap();
        assert_eq!(sessions.active("s1").status, Some(IncidentStatus::Confirmed));
        assert!(sessions.active("s2").is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let sessions = FilterSessions::new();
        sessions.set_predicate("s1", FilterField::Type, "hazard").unwrap();
        sessions.set_predicate("s1", FilterField::Severity, "low").unwrap();

        let active = sessions.remove_predicate("s1", FilterField::Type);
        assert_eq!(active.incident_type, None);
        assert_eq!(active.severity, Some(Severity::Low));

        assert!(sessions.clear("s1"));
        assert!(!sessions.clear("s1"));
        assert!(sessions.is_empty());
    }

    #[test]
    fn bad_predicate_value_is_rejected() {
        let sessions = FilterSessions::new();
        assert!(sessions.set_predicate("s1", FilterField::Severity, "extreme").is_err());
        assert!(sessions.active("s1").is_empty());
    }
}
