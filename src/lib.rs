//! RoadWatch: traffic incident reporting core
//!
//! Incidents are reported by drivers, validated, rate limited per reporter,
//! parked in an offline queue and published once confirmed. Consumers list
//! them through a filter / search / sort pipeline and keep views fresh with
//! a periodic refresh scheduler.
//!
//! ## Modules
//!
//! - [`validation`]: field rules for incident and route drafts
//! - [`admission`]: fixed-window per-subject rate limiter
//! - [`queue`]: offline submission queue and publisher
//! - [`refresh`]: single-flight periodic refresh
//! - [`query`]: filter, keyword search and sort over incident lists
//! - [`api`]: axum HTTP boundary

pub mod admission;
pub mod api;
pub mod config;
pub mod geocode;
pub mod incidents;
pub mod model;
pub mod query;
pub mod queue;
pub mod refresh;
pub mod routes;
pub mod storage;
pub mod validation;

pub use admission::SubmissionAdmission;
pub use config::AppConfig;
pub use incidents::IncidentService;
pub use query::QueryPipeline;
pub use queue::{OfflineSubmissionQueue, SubmissionPublisher};
pub use refresh::RefreshScheduler;
pub use validation::{validate, ValidationReport};
