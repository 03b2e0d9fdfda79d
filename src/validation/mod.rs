//! Incident payload validation
//!
//! Pure rule checks over raw [`IncidentDraft`] payloads. Every rule runs
//! independently and every violation is collected, so a reporter sees all
//! problems in one round-trip. Nothing here fails or panics on bad input.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::config::defaults::{MAX_DESCRIPTION_CHARS, MAX_LOCATION_CHARS};
use crate::model::{IncidentDraft, IncidentType, RouteDraft, Severity};

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.valid {
            write!(f, "valid")
        } else {
            write!(f, "{}", self.errors.join("; "))
        }
    }
}

fn allowed_types() -> String {
    IncidentType::ALL
        .iter()
        .map(IncidentType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn allowed_severities() -> String {
    Severity::ALL
        .iter()
        .map(Severity::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a raw incident payload.
pub fn validate(draft: &IncidentDraft) -> ValidationReport {
    let mut errors = Vec::new();

    let type_ok = draft
        .incident_type
        .as_deref()
        .is_some_and(|t| t.parse::<IncidentType>().is_ok());
    if !type_ok {
        errors.push(format!(
            "Invalid incident type. Must be one of: {}",
            allowed_types()
        ));
    }

    let severity_ok = draft
        .severity
        .as_deref()
        .is_some_and(|s| s.parse::<Severity>().is_ok());
    if !severity_ok {
        errors.push(format!(
            "Invalid severity level. Must be one of: {}",
            allowed_severities()
        ));
    }

    match draft.location.as_deref() {
        None => errors.push("Location is required".to_string()),
        Some(loc) if loc.trim().is_empty() => errors.push("Location is required".to_string()),
        Some(loc) if loc.chars().count() > MAX_LOCATION_CHARS => errors.push(format!(
            "Location must be {MAX_LOCATION_CHARS} characters or less"
        )),
        Some(_) => {}
    }

    if let Some(desc) = draft.description.as_deref() {
        if desc.chars().count() > MAX_DESCRIPTION_CHARS {
            errors.push(format!(
                "Description must be {MAX_DESCRIPTION_CHARS} characters or less"
            ));
        }
    }

    errors.extend(coordinate_errors(draft.latitude, draft.longitude));

    ValidationReport::from_errors(errors)
}

/// Validate a coordinate pair on its own. Absent values are not checked.
pub fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> ValidationReport {
    ValidationReport::from_errors(coordinate_errors(latitude, longitude))
}

fn coordinate_errors(latitude: Option<f64>, longitude: Option<f64>) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            errors.push("Invalid latitude. Must be between -90 and 90".to_string());
        }
    }
    if let Some(lon) = longitude {
        if !(-180.0..=180.0).contains(&lon) {
            errors.push("Invalid longitude. Must be between -180 and 180".to_string());
        }
    }
    errors
}

/// Trim and strip `<` / `>`. A minimal guard, not an HTML sanitizer.
pub fn sanitize_string(input: &str) -> String {
    input.trim().replace(['<', '>'], "")
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9+_.-]+@(.+)$").ok())
        .as_ref()
}

/// Loose email shape check (`local@domain`).
pub fn validate_email(email: &str) -> bool {
    if email.trim().is_empty() {
        return false;
    }
    email_pattern().is_some_and(|re| re.is_match(email))
}

/// Validate a saved-route payload.
pub fn validate_route(draft: &RouteDraft) -> ValidationReport {
    let mut errors = Vec::new();
    if draft.name.trim().is_empty() {
        errors.push("Route name is required".to_string());
    }
    if draft.user_id.trim().is_empty() {
        errors.push("User id is required".to_string());
    }
    if draft.radius_m == Some(0) {
        errors.push("Radius must be greater than 0".to_string());
    }
    errors.extend(coordinate_errors(Some(draft.latitude), Some(draft.longitude)));
    ValidationReport::from_errors(errors)
}
