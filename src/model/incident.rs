//! Incident records, their closed vocabularies, and the raw boundary payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Patch;

/// A label that does not belong to its fixed domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} '{value}'")]
pub struct ParseLabelError {
    pub field: &'static str,
    pub value: String,
}

// ============================================================================
// Incident Type
// ============================================================================

/// Kind of traffic event being reported
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IncidentType {
    Accident,
    Construction,
    Closure,
    Hazard,
}

impl IncidentType {
    pub const ALL: [IncidentType; 4] = [
        IncidentType::Accident,
        IncidentType::Construction,
        IncidentType::Closure,
        IncidentType::Hazard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::Accident => "accident",
            IncidentType::Construction => "construction",
            IncidentType::Closure => "closure",
            IncidentType::Hazard => "hazard",
        }
    }
}

impl std::fmt::Display for IncidentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == folded)
            .ok_or_else(|| ParseLabelError {
                field: "type",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Severity
// ============================================================================

/// How disruptive an incident is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Fixed sort rank. Never compare severities lexically.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == folded)
            .ok_or_else(|| ParseLabelError {
                field: "severity",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// Incident Status
// ============================================================================

/// Moderation status of an incident
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::Confirmed => "confirmed",
            IncidentStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(IncidentStatus::Pending),
            "confirmed" => Ok(IncidentStatus::Confirmed),
            "rejected" => Ok(IncidentStatus::Rejected),
            _ => Err(ParseLabelError {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// A validated, queryable traffic incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reporter_id: Option<String>,
    #[serde(default)]
    pub status: IncidentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

/// Raw incident payload as received from a reporter.
///
/// `type` and `severity` stay free-form so validation can report every
/// violation instead of failing at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IncidentDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub incident_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IncidentStatus>,
}

impl From<&Incident> for IncidentDraft {
    fn from(incident: &Incident) -> Self {
        Self {
            id: Some(incident.id.clone()),
            incident_type: Some(incident.incident_type.as_str().to_string()),
            severity: Some(incident.severity.as_str().to_string()),
            location: Some(incident.location.clone()),
            latitude: incident.latitude,
            longitude: incident.longitude,
            description: incident.description.clone(),
            timestamp: Some(incident.timestamp),
            reporter_id: incident.reporter_id.clone(),
            status: Some(incident.status),
        }
    }
}

/// Partial update for an incident.
///
/// Absent fields are preserved. `null` clears a field, which is only
/// meaningful for the optional ones (coordinates, description).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IncidentPatch {
    #[serde(rename = "type", default)]
    pub incident_type: Patch<String>,
    #[serde(default)]
    pub severity: Patch<String>,
    #[serde(default)]
    pub location: Patch<String>,
    #[serde(default)]
    pub latitude: Patch<f64>,
    #[serde(default)]
    pub longitude: Patch<f64>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub status: Patch<IncidentStatus>,
}

impl IncidentPatch {
    /// Merge this patch into a draft built from the stored record.
    ///
    /// Returns one message per required field the patch tried to clear.
    pub fn apply(self, draft: &mut IncidentDraft) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, patch, slot) in [
            ("type", self.incident_type, &mut draft.incident_type),
            ("severity", self.severity, &mut draft.severity),
            ("location", self.location, &mut draft.location),
        ] {
            match patch {
                Patch::Clear => errors.push(format!("Field '{name}' is required and cannot be cleared")),
                other => other.apply_to(slot),
            }
        }

        if matches!(self.status, Patch::Clear) {
            errors.push("Field 'status' is required and cannot be cleared".to_string());
        } else {
            self.status.apply_to(&mut draft.status);
        }

        self.latitude.apply_to(&mut draft.latitude);
        self.longitude.apply_to(&mut draft.longitude);
        self.description.apply_to(&mut draft.description);

        errors
    }
}
