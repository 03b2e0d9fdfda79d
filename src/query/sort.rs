//! Stable ordering by time, severity rank, or type

use std::cmp::Ordering;

use crate::model::{Incident, SortKey, SortOrder};

fn compare(a: &Incident, b: &Incident, key: SortKey) -> Ordering {
    match key {
        SortKey::Time => a.timestamp.cmp(&b.timestamp),
        SortKey::Severity => a.severity.rank().cmp(&b.severity.rank()),
        SortKey::Type => a.incident_type.as_str().cmp(b.incident_type.as_str()),
    }
}

/// Sort in place. Equal keys keep their input order in both directions.
pub fn apply(incidents: &mut [Incident], key: SortKey, order: SortOrder) {
    match order {
        SortOrder::Asc => incidents.sort_by(|a, b| compare(a, b, key)),
        SortOrder::Desc => incidents.sort_by(|a, b| compare(a, b, key).reverse()),
    }
}
