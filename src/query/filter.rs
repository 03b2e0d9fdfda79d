//! Equality filtering

use crate::model::{FilterSpec, Incident};

/// Keep incidents matching every present predicate, preserving input order.
pub fn apply(incidents: Vec<Incident>, filter: &FilterSpec) -> Vec<Incident> {
    if filter.is_empty() {
        return incidents;
    }
    incidents.into_iter().filter(|i| filter.matches(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IncidentStatus, IncidentType, Severity};
    use crate::query::tests::incident;

    #[test]
    fn empty_filter_is_pass_through() {
        let input = vec![
            incident("a", IncidentType::Accident, Severity::Low, 0),
            incident("b", IncidentType::Hazard, Severity::High, 1),
        ];
        assert_eq!(apply(input.clone(), &FilterSpec::default()), input);
    }

    #[test]
    fn predicates_are_and_combined() {
        let mut confirmed_high = incident("a", IncidentType::Accident, Severity::High, 0);
        confirmed_high.status = IncidentStatus::Confirmed;
        let pending_high = incident("b", IncidentType::Accident, Severity::High, 1);
        let mut confirmed_low = incident("c", IncidentType::Accident, Severity::Low, 2);
        confirmed_low.status = IncidentStatus::Confirmed;

        let filter = FilterSpec {
            severity: Some(Severity::High),
            status: Some(IncidentStatus::Confirmed),
            ..Default::default()
        };
        let out = apply(vec![confirmed_high, pending_high, confirmed_low], &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a");
    }
}
