//! Periodic refresh scheduler
//!
//! Invokes a caller-supplied async callback every `interval_ms`, starting
//! immediately on [`RefreshScheduler::start`]. The timer runs on its own
//! tokio task and every invocation runs on a spawned task, so callers are
//! never blocked and a slow callback never stalls the timer.
//!
//! ## Overlap policy
//!
//! Single-flight. A tick that finds the previous invocation still running
//! is skipped (and counted in [`RefreshStats::skipped`]). Errors and panics
//! from the callback are logged and counted; later ticks still fire.
//!
//! [`RefreshScheduler::stop`] cancels future ticks but never interrupts an
//! invocation that is already running.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::defaults::MIN_REFRESH_INTERVAL_MS;
use crate::incidents::IncidentService;
use crate::model::QuerySpec;
use crate::queue::OfflineSubmissionQueue;

pub type RefreshCallback = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh interval {0} ms is below the {min} ms floor", min = MIN_REFRESH_INTERVAL_MS)]
    IntervalTooShort(u64),
    #[error("refresh scheduler needs a tokio runtime: {0}")]
    NoRuntime(String),
}

/// Tick counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    /// Ticks that started a callback
    pub fired: u64,
    /// Ticks dropped because the previous callback was still running
    pub skipped: u64,
    /// Callbacks that returned an error or panicked
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    fired: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

struct SchedulerState {
    interval_ms: u64,
    /// `Some` while running
    cancel: Option<CancellationToken>,
}

/// Clears the in-flight flag when the invocation ends, however it ends.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RefreshScheduler {
    callback: RefreshCallback,
    runtime: Handle,
    state: Mutex<SchedulerState>,
    in_flight: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl RefreshScheduler {
    /// Build a stopped scheduler. Must be called from within a tokio runtime.
    pub fn new<F, Fut>(interval_ms: u64, callback: F) -> Result<Self, RefreshError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if interval_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(RefreshError::IntervalTooShort(interval_ms));
        }
        let runtime = Handle::try_current().map_err(|e| RefreshError::NoRuntime(e.to_string()))?;
        let callback: RefreshCallback = Arc::new(move || callback().boxed());

        Ok(Self {
            callback,
            runtime,
            state: Mutex::new(SchedulerState {
                interval_ms,
                cancel: None,
            }),
            in_flight: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the timer. False if already running.
    pub fn start(&self) -> bool {
        let mut state = self.state();
        if state.cancel.is_some() {
            debug!("Refresh scheduler already running");
            return false;
        }
        state.cancel = Some(self.spawn_loop(state.interval_ms));
        info!(interval_ms = state.interval_ms, "Refresh scheduler started");
        true
    }

    /// Disarm the timer. False if not running.
    pub fn stop(&self) -> bool {
        let mut state = self.state();
        match state.cancel.take() {
            Some(token) => {
                token.cancel();
                info!("Refresh scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Change the interval, restarting the timer if it is running.
    ///
    /// Rejects intervals below the floor and leaves the old one in place.
    pub fn set_interval(&self, interval_ms: u64) -> bool {
        if interval_ms < MIN_REFRESH_INTERVAL_MS {
            warn!(
                interval_ms,
                min_ms = MIN_REFRESH_INTERVAL_MS,
                "Rejected refresh interval below floor"
            );
            return false;
        }

        let mut state = self.state();
        state.interval_ms = interval_ms;
        if let Some(old) = state.cancel.take() {
            old.cancel();
            state.cancel = Some(self.spawn_loop(interval_ms));
            info!(interval_ms, "Refresh scheduler restarted with new interval");
        } else {
            debug!(interval_ms, "Refresh interval updated");
        }
        true
    }

    pub fn interval_ms(&self) -> u64 {
        self.state().interval_ms
    }

    pub fn is_running(&self) -> bool {
        self.state().cancel.is_some()
    }

    pub fn stats(&self) -> RefreshStats {
        RefreshStats {
            fired: self.counters.fired.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    fn spawn_loop(&self, interval_ms: u64) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let callback = self.callback.clone();
        let in_flight = self.in_flight.clone();
        let counters = self.counters.clone();
        let runtime = self.runtime.clone();

        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("[RefreshScheduler] Timer cancelled");
                        return;
                    }
                    _ = interval.tick() => {
                        if in_flight
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_err()
                        {
                            counters.skipped.fetch_add(1, Ordering::Relaxed);
                            debug!("[RefreshScheduler] Previous refresh still running, tick skipped");
                            continue;
                        }
                        counters.fired.fetch_add(1, Ordering::Relaxed);

                        let guard = InFlightGuard(in_flight.clone());
                        let callback = callback.clone();
                        let counters = counters.clone();
                        runtime.spawn(async move {
                            let _guard = guard;
                            let outcome = AssertUnwindSafe(async move { callback().await })
                                .catch_unwind()
                                .await;
                            match outcome {
                                Ok(Ok(())) => {}
                                Ok(Err(e)) => {
                                    counters.failed.fetch_add(1, Ordering::Relaxed);
                                    warn!(error = %e, "[RefreshScheduler] Refresh callback failed");
                                }
                                Err(_) => {
                                    counters.failed.fetch_add(1, Ordering::Relaxed);
                                    warn!("[RefreshScheduler] Refresh callback panicked");
                                }
                            }
                        });
                    }
                }
            }
        });

        cancel
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.state().cancel.take() {
            token.cancel();
        }
    }
}

// ============================================================================
// Incident refresh
// ============================================================================

/// What the last refresh saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSnapshot {
    pub refreshed_at: chrono::DateTime<chrono::Utc>,
    pub incident_count: usize,
    pub pending_submissions: usize,
}

/// Callback that re-runs the default incident query and publishes a
/// [`RefreshSnapshot`] to every watcher.
pub fn snapshot_refresh(
    incidents: Arc<IncidentService>,
    queue: Arc<OfflineSubmissionQueue>,
    tx: watch::Sender<Option<RefreshSnapshot>>,
) -> impl Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static {
    let tx = Arc::new(tx);
    move || {
        let incidents = incidents.clone();
        let queue = queue.clone();
        let tx = tx.clone();
        async move {
            let incident_count = incidents.list(&QuerySpec::default())?.len();
            let pending_submissions = queue.list_pending()?.len();
            let snapshot = RefreshSnapshot {
                refreshed_at: chrono::Utc::now(),
                incident_count,
                pending_submissions,
            };
            debug!(incident_count, pending_submissions, "Refresh snapshot published");
            tx.send_replace(Some(snapshot));
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn counting(interval_ms: u64) -> (RefreshScheduler, Arc<AtomicU64>) {
        let calls = Arc::new(AtomicU64::new(0));
        let c = calls.clone();
        let scheduler = RefreshScheduler::new(interval_ms, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        })
        .unwrap();
        (scheduler, calls)
    }

    async fn advance_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test]
    async fn rejects_interval_below_floor() {
        assert!(matches!(
            RefreshScheduler::new(4999, || async { Ok::<(), anyhow::Error>(()) }),
            Err(RefreshError::IntervalTooShort(4999))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_every_interval() {
        let (scheduler, calls) = counting(5000);
        assert!(scheduler.start());
        assert!(!scheduler.start());

        advance_ms(500).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        advance_ms(12_000).await; // t = 12.5 s
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.stats().fired, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_halts_ticks() {
        let (scheduler, calls) = counting(5000);
        assert!(!scheduler.stop());
        scheduler.start();
        advance_ms(500).await;
        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!scheduler.is_running());

        advance_ms(20_000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Restartable after stop.
        assert!(scheduler.start());
        advance_ms(500).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn set_interval_validates_and_restarts() {
        let (scheduler, calls) = counting(5000);
        assert!(!scheduler.set_interval(1000));
        assert_eq!(scheduler.interval_ms(), 5000);

        scheduler.start();
        advance_ms(1000).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Restart fires immediately, then every 10 s.
        assert!(scheduler.set_interval(10_000));
        assert_eq!(scheduler.interval_ms(), 10_000);
        assert!(scheduler.is_running());
        advance_ms(9_500).await; // t = 10.5 s
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        advance_ms(1_000).await; // t = 11.5 s
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_skipped() {
        let calls = Arc::new(AtomicU64::new(0));
        let c = calls.clone();
        let scheduler = RefreshScheduler::new(5000, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(12_000)).await;
                Ok::<(), anyhow::Error>(())
            }
        })
        .unwrap();

        scheduler.start();
        advance_ms(15_500).await;

        // Fired at 0 s and 15 s; 5 s and 10 s found the first call running.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let stats = scheduler.stats();
        assert_eq!(stats.fired, 2);
        assert_eq!(stats.skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_ticks() {
        let calls = Arc::new(AtomicU64::new(0));
        let c = calls.clone();
        let scheduler = RefreshScheduler::new(5000, move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 1 {
                    panic!("refresh exploded");
                }
                Err::<(), _>(anyhow::anyhow!("upstream unavailable"))
            }
        })
        .unwrap();

        scheduler.start();
        advance_ms(10_500).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let stats = scheduler.stats();
        assert_eq!(stats.fired, 3);
        assert_eq!(stats.failed, 3);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_refresh_publishes_counts() {
        let store = Arc::new(InMemoryStore::new());
        let incidents = Arc::new(IncidentService::new(store.clone()));
        let queue = Arc::new(OfflineSubmissionQueue::new(store));
        queue.enqueue("{}").unwrap();

        let (tx, mut rx) = watch::channel(None);
        let scheduler =
            RefreshScheduler::new(5000, snapshot_refresh(incidents, queue, tx)).unwrap();
        scheduler.start();

        rx.changed().await.unwrap();
        let snapshot = rx.borrow().clone().unwrap();
        assert_eq!(snapshot.incident_count, 0);
        assert_eq!(snapshot.pending_submissions, 1);
    }
}
