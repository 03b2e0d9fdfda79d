//! Keyword search and the bounded search history

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::model::Incident;

/// Trim and case-fold a keyword. Blank input yields `None`.
pub fn normalize(keyword: &str) -> Option<String> {
    let folded = keyword.trim().to_lowercase();
    (!folded.is_empty()).then_some(folded)
}

fn contains(field: &str, needle: &str) -> bool {
    field.to_lowercase().contains(needle)
}

/// Substring match of an already-normalized keyword against location,
/// description and type.
pub fn matches(incident: &Incident, needle: &str) -> bool {
    contains(&incident.location, needle)
        || incident
            .description
            .as_deref()
            .is_some_and(|d| contains(d, needle))
        || incident.incident_type.as_str().contains(needle)
}

/// Keep incidents matching an already-normalized keyword, preserving order.
pub fn apply(incidents: Vec<Incident>, needle: &str) -> Vec<Incident> {
    incidents.into_iter().filter(|i| matches(i, needle)).collect()
}

/// Most-recent-first, de-duplicated keyword history with a fixed capacity.
#[derive(Debug)]
pub struct SearchHistory {
    entries: Mutex<VecDeque<String>>,
    cap: usize,
}

impl SearchHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    /// Record a normalized keyword, moving it to the front if already present.
    pub fn record(&self, keyword: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!("Search history lock poisoned, keyword not recorded");
            return;
        };
        entries.retain(|k| k != keyword);
        entries.push_front(keyword.to_string());
        entries.truncate(self.cap);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
