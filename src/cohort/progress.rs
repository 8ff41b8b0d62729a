//! Background progress monitor for cohort runs.
//!
//! Periodically logs how many subjects have been computed, skipped or have
//! failed so operators can follow long runs over large cohorts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use super::worker::SubjectOutcome;

/// Snapshot of progress counters at a point in time.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Subjects whose Pi10 indices were evaluated.
    pub computed: usize,
    /// Subjects without an airway-tree artifact.
    pub skipped: usize,
    /// Subjects that failed to load, panicked or timed out.
    pub failed: usize,
    /// Wall-clock elapsed time since the monitor started.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn finished(&self) -> usize {
        self.computed + self.skipped + self.failed
    }
}

/// Shared atomic counters incremented by subject workers.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounters {
    pub computed: Arc<AtomicUsize>,
    pub skipped: Arc<AtomicUsize>,
    pub failed: Arc<AtomicUsize>,
}

impl ProgressCounters {
    /// Create a new set of zeroed progress counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished subject.
    pub fn record(&self, outcome: &SubjectOutcome) {
        let counter = match outcome {
            SubjectOutcome::Computed(_) => &self.computed,
            SubjectOutcome::Skipped { .. } => &self.skipped,
            SubjectOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of the current counter values.
    pub fn snapshot(&self, start: Instant) -> ProgressSnapshot {
        ProgressSnapshot {
            computed: self.computed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
        }
    }
}

/// A background task that periodically logs cohort progress.
///
/// Call [`ProgressMonitor::stop`] to cancel and wait for the task. Dropping
/// the monitor aborts the task immediately.
pub struct ProgressMonitor {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Start a background progress monitor that logs every `interval`.
    ///
    /// # Arguments
    ///
    /// * `counters` - Shared counters incremented by subject workers
    /// * `total` - Number of subjects in the cohort
    /// * `interval` - How often to emit progress logs
    pub fn start(counters: ProgressCounters, total: usize, interval: Duration) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();
        let start = Instant::now();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await; // skip the immediate first tick

            loop {
                tick.tick().await;
                if flag.load(Ordering::Relaxed) {
                    break;
                }

                let snap = counters.snapshot(start);
                let pct = if total > 0 {
                    (snap.finished() as f64 / total as f64 * 100.0).min(100.0)
                } else {
                    100.0
                };
                let elapsed_secs = snap.elapsed.as_secs_f64();
                let subjects_per_sec = if elapsed_secs > 0.0 {
                    snap.finished() as f64 / elapsed_secs
                } else {
                    0.0
                };

                tracing::info!(
                    computed = snap.computed,
                    skipped = snap.skipped,
                    failed = snap.failed,
                    total = total,
                    progress_pct = format!("{:.1}%", pct),
                    elapsed_secs = snap.elapsed.as_secs(),
                    subjects_per_sec = format!("{:.2}", subjects_per_sec),
                    "Cohort progress"
                );
            }
        });

        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Signal the background monitor to stop and wait for it to finish.
    pub async fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
