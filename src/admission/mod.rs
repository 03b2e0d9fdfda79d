//! Submission admission control
//!
//! Fixed-window counter per subject (reporter id). A window opens on the
//! first check for a subject and admits up to `limit` submissions until
//! `window_ms` has elapsed, after which the next check opens a fresh window.
//!
//! This is a fixed window, not a sliding log: up to `2 × limit` submissions
//! can be admitted in quick succession straddling a window boundary.
//!
//! Windows live in a [`DashMap`]; the check-and-increment runs under the
//! shard lock for that subject, so concurrent checks for one subject cannot
//! double-admit. Stale windows are evicted by [`SubmissionAdmission::sweep_stale`],
//! normally driven by [`SubmissionAdmission::spawn_sweeper`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AdmissionConfig;

// ============================================================================
// Clock
// ============================================================================

/// Millisecond wall clock, injectable for tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Real time from the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Hand-driven clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Admission
// ============================================================================

/// Per-subject window state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateWindow {
    pub window_start_ms: u64,
    pub count: u32,
}

impl RateWindow {
    fn opened_at(now_ms: u64) -> Self {
        Self {
            window_start_ms: now_ms,
            count: 1,
        }
    }
}

pub struct SubmissionAdmission {
    windows: DashMap<String, RateWindow>,
    limit: u32,
    window_ms: u64,
    eviction_multiplier: u32,
    clock: Arc<dyn Clock>,
}

impl SubmissionAdmission {
    /// Limiter on the system clock.
    pub fn new(limit: u32, window_ms: u64) -> Self {
        Self::with_clock(limit, window_ms, Arc::new(SystemClock))
    }

    pub fn with_clock(limit: u32, window_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window_ms,
            eviction_multiplier: crate::config::defaults::ADMISSION_EVICTION_MULTIPLIER,
            clock,
        }
    }

    pub fn from_config(config: &AdmissionConfig) -> Self {
        let mut admission = Self::new(config.limit, config.window_ms);
        admission.eviction_multiplier = config.eviction_multiplier;
        admission
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Decide whether `subject` may submit now, recording the attempt if so.
    ///
    /// A denied call leaves the subject's window untouched.
    pub fn can_submit(&self, subject: &str) -> bool {
        let now = self.clock.now_ms();

        let allowed = match self.windows.entry(subject.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(RateWindow::opened_at(now));
                true
            }
            Entry::Occupied(mut slot) => {
                let window = slot.get_mut();
                if now.saturating_sub(window.window_start_ms) > self.window_ms {
                    *window = RateWindow::opened_at(now);
                    true
                } else if window.count < self.limit {
                    window.count += 1;
                    true
                } else {
                    false
                }
            }
        };

        if allowed {
            debug!(subject = %subject, "Submission admitted");
        } else {
            warn!(subject = %subject, limit = self.limit, window_ms = self.window_ms, "Submission rate limit exceeded");
        }
        allowed
    }

    /// Current window for `subject`, if one is tracked.
    pub fn window(&self, subject: &str) -> Option<RateWindow> {
        self.windows.get(subject).map(|w| *w)
    }

    /// Administrative override: forget a subject's window.
    ///
    /// Returns false if nothing was tracked for it.
    pub fn reset_subject(&self, subject: &str) -> bool {
        let removed = self.windows.remove(subject).is_some();
        if removed {
            info!(subject = %subject, "Admission window reset");
        }
        removed
    }

    pub fn tracked_subjects(&self) -> usize {
        self.windows.len()
    }

    /// Evict windows that opened more than `eviction_multiplier × window_ms` ago.
    ///
    /// Returns the number of evicted subjects.
    pub fn sweep_stale(&self) -> usize {
        let now = self.clock.now_ms();
        let max_age = self
            .window_ms
            .saturating_mul(u64::from(self.eviction_multiplier));
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_sub(w.window_start_ms) <= max_age);
        before.saturating_sub(self.windows.len())
    }

    /// Run [`sweep_stale`](Self::sweep_stale) every `every` until `cancel` fires.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately; nothing is stale yet.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("[AdmissionSweeper] Shutdown");
                        return;
                    }
                    _ = interval.tick() => {
                        let evicted = self.sweep_stale();
                        if evicted > 0 {
                            info!(
                                evicted,
                                tracked = self.tracked_subjects(),
                                "[AdmissionSweeper] Evicted stale windows"
                            );
                        }
                    }
                }
            }
        })
    }
}
