//! Query request types: equality filters, keyword search, and sort.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Incident, IncidentStatus, IncidentType, ParseLabelError, Severity};

/// Optional equality predicates. Absent fields are wildcards; present
/// fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub incident_type: Option<IncidentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IncidentStatus>,
}

/// A single filterable field, used to drop one predicate from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Type,
    Severity,
    Status,
}

impl FromStr for FilterField {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "type" => Ok(FilterField::Type),
            "severity" => Ok(FilterField::Severity),
            "status" => Ok(FilterField::Status),
            _ => Err(ParseLabelError {
                field: "filter field",
                value: s.to_string(),
            }),
        }
    }
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.incident_type.is_none() && self.severity.is_none() && self.status.is_none()
    }

    pub fn matches(&self, incident: &Incident) -> bool {
        self.incident_type.map_or(true, |t| t == incident.incident_type)
            && self.severity.map_or(true, |s| s == incident.severity)
            && self.status.map_or(true, |s| s == incident.status)
    }

    /// Overlay the predicates present in `other` onto `self`.
    pub fn merge(&mut self, other: &FilterSpec) {
        if other.incident_type.is_some() {
            self.incident_type = other.incident_type;
        }
        if other.severity.is_some() {
            self.severity = other.severity;
        }
        if other.status.is_some() {
            self.status = other.status;
        }
    }

    pub fn remove(&mut self, field: FilterField) {
        match field {
            FilterField::Type => self.incident_type = None,
            FilterField::Severity => self.severity = None,
            FilterField::Status => self.status = None,
        }
    }
}

/// Sort key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Time,
    Severity,
    Type,
}

impl FromStr for SortKey {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time" => Ok(SortKey::Time),
            "severity" => Ok(SortKey::Severity),
            "type" => Ok(SortKey::Type),
            _ => Err(ParseLabelError {
                field: "sortBy",
                value: s.to_string(),
            }),
        }
    }
}

/// Sort direction, descending unless asked otherwise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ParseLabelError {
                field: "order",
                value: s.to_string(),
            }),
        }
    }
}

/// Full query: filter, then keyword search, then sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    #[serde(default)]
    pub filter: FilterSpec,
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub order: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_overrides_present_fields() {
        let mut active = FilterSpec {
            incident_type: Some(IncidentType::Accident),
            severity: Some(Severity::High),
            status: None,
        };
        active.merge(&FilterSpec {
            status: Some(IncidentStatus::Confirmed),
            ..Default::default()
        });
        assert_eq!(active.incident_type, Some(IncidentType::Accident));
        assert_eq!(active.severity, Some(Severity::High));
        assert_eq!(active.status, Some(IncidentStatus::Confirmed));
    }

    #[test]
    fn sort_defaults() {
        assert_eq!(SortKey::default(), SortKey::Time);
        assert_eq!(SortOrder::default(), SortOrder::Desc);
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
