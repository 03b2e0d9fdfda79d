//! Queued incident submissions and their status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ParseLabelError;

/// Delivery status of a queued submission
///
/// `Pending` moves to `Sent` or `Failed`. Both are terminal; resubmitting a
/// failed report creates a new pending record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Sent => "sent",
            SubmissionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        matches!(
            (self, next),
            (SubmissionStatus::Pending, SubmissionStatus::Sent)
                | (SubmissionStatus::Pending, SubmissionStatus::Failed)
        )
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SubmissionStatus::Pending),
            "sent" => Ok(SubmissionStatus::Sent),
            "failed" => Ok(SubmissionStatus::Failed),
            _ => Err(ParseLabelError {
                field: "submission status",
                value: s.to_string(),
            }),
        }
    }
}

/// A queued report awaiting publication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    /// Opaque JSON payload of the submitted incident
    pub payload: String,
    pub timestamp: DateTime<Utc>,
    pub status: SubmissionStatus,
}

impl Submission {
    /// New pending submission stamped with the current time.
    pub fn new_pending(payload: impl Into<String>) -> Self {
        Self {
            id: super::generate_id("sub"),
            payload: payload.into(),
            timestamp: Utc::now(),
            status: SubmissionStatus::Pending,
        }
    }
}
