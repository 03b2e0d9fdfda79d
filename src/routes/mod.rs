//! Saved routes
//!
//! Areas a user monitors for incidents: a named point with a radius.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::model::{generate_id, RouteDraft, SavedRoute, DEFAULT_ROUTE_RADIUS_M};
use crate::storage::{RouteStore, StorageError};
use crate::validation::{sanitize_string, validate_route, ValidationReport};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("validation failed: {0}")]
    Validation(ValidationReport),
    #[error("route not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct SavedRoutesService {
    store: Arc<dyn RouteStore>,
}

impl SavedRoutesService {
    pub fn new(store: Arc<dyn RouteStore>) -> Self {
        Self { store }
    }

    /// A user's routes, oldest first
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<SavedRoute>, RouteError> {
        Ok(self.store.for_user(user_id)?)
    }

    pub fn get(&self, id: &str) -> Result<SavedRoute, RouteError> {
        self.store
            .get(id)?
            .ok_or_else(|| RouteError::NotFound(id.to_string()))
    }

    pub fn add(&self, draft: RouteDraft) -> Result<SavedRoute, RouteError> {
        let draft = checked(draft)?;
        let route = SavedRoute {
            id: generate_id("route"),
            name: draft.name,
            latitude: draft.latitude,
            longitude: draft.longitude,
            radius_m: draft.radius_m.unwrap_or(DEFAULT_ROUTE_RADIUS_M),
            user_id: draft.user_id,
            created_at: Utc::now(),
        };
        self.store.save(&route)?;
        info!(route_id = %route.id, user_id = %route.user_id, "Route saved");
        Ok(route)
    }

    /// Replace a route's fields. Id and creation time are kept; a missing
    /// radius keeps the stored one.
    pub fn update(&self, id: &str, draft: RouteDraft) -> Result<SavedRoute, RouteError> {
        let existing = self.get(id)?;
        let draft = checked(draft)?;
        let route = SavedRoute {
            name: draft.name,
            latitude: draft.latitude,
            longitude: draft.longitude,
            radius_m: draft.radius_m.unwrap_or(existing.radius_m),
            user_id: draft.user_id,
            ..existing
        };
        self.store.save(&route)?;
        Ok(route)
    }

    pub fn delete(&self, id: &str) -> Result<(), RouteError> {
        if self.store.delete(id)? {
            info!(route_id = %id, "Route deleted");
            Ok(())
        } else {
            Err(RouteError::NotFound(id.to_string()))
        }
    }
}

fn checked(mut draft: RouteDraft) -> Result<RouteDraft, RouteError> {
    draft.name = sanitize_string(&draft.name);
    draft.user_id = draft.user_id.trim().to_string();
    let report = validate_route(&draft);
    if report.valid {
        Ok(draft)
    } else {
        Err(RouteError::Validation(report))
    }
}
