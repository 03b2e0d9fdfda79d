//! Incident query pipeline
//!
//! Fixed order: filter → search → sort.
//!
//! - [`filter`]: AND-combined equality predicates, absent fields are wildcards
//! - [`search`]: trimmed, case-folded substring match on location,
//!   description and type, plus the bounded search history
//! - [`sort`]: stable ordering by time, severity rank, or type
//! - [`sessions`]: per-session accumulated filter state
//!
//! The pipeline itself holds no per-request state. The only side channel is
//! the search history, which each non-blank keyword updates.

pub mod filter;
pub mod search;
pub mod sessions;
pub mod sort;

pub use search::SearchHistory;
pub use sessions::FilterSessions;

use tracing::debug;

use crate::config::defaults::SEARCH_HISTORY_CAP;
use crate::model::{Incident, QuerySpec};

#[derive(Debug)]
pub struct QueryPipeline {
    history: SearchHistory,
}

impl Default for QueryPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryPipeline {
    pub fn new() -> Self {
        Self {
            history: SearchHistory::new(SEARCH_HISTORY_CAP),
        }
    }

    /// Run `query` over `incidents`.
    pub fn run(&self, incidents: Vec<Incident>, query: &QuerySpec) -> Vec<Incident> {
        let total = incidents.len();
        let filtered = filter::apply(incidents, &query.filter);

        let mut results = match search::normalize(&query.keyword) {
            Some(needle) => {
                self.history.record(&needle);
                search::apply(filtered, &needle)
            }
            None => filtered,
        };

        sort::apply(&mut results, query.sort_by, query.order);

        debug!(
            total,
            matched = results.len(),
            sort_by = ?query.sort_by,
            order = ?query.order,
            "Query pipeline complete"
        );
        results
    }

    /// Recent keywords, most recent first.
    pub fn search_history(&self) -> Vec<String> {
        self.history.snapshot()
    }

    pub fn clear_search_history(&self) {
        self.history.clear();
    }
}
