//! Saved routes / areas a user monitors for incidents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitoring radius used when the user does not pick one (1 km).
pub const DEFAULT_ROUTE_RADIUS_M: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedRoute {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: u32,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Route payload as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RouteDraft {
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub radius_m: Option<u32>,
    #[serde(default)]
    pub user_id: String,
}
