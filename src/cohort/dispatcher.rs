//! Cohort dispatcher: bounded parallel Pi10 computation with ordered gather.
//!
//! Every subject directory is submitted to the tokio blocking pool, at most
//! `workers` at a time. Join handles are awaited in submission order, so the
//! gathered outcomes are index-aligned with the sorted subject list no matter
//! which subject finishes first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, info, warn};

use super::config::{CohortConfig, FailurePolicy};
use super::discovery::{discover_subjects, SubjectDir};
use super::progress::{ProgressCounters, ProgressMonitor};
use super::worker::{process_subject, SubjectOutcome};
use crate::airway::{AirwayTreeLoader, FileTreeLoader, SubsetPolicy};
use crate::error::{CohortError, ExportError};
use crate::export::CohortTable;

/// Header of the subject identifier column in the Pi10 table.
pub const SUBJECT_ID_COLUMN: &str = "subject_id";

/// Summary of a `compute-pi10` run.
#[derive(Debug, Clone, Serialize)]
pub struct CohortReport {
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub discovered: usize,
    pub computed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows_written: usize,
    /// Undefined Pi10 cells among computed subjects, keyed by output column.
    pub undefined: BTreeMap<String, usize>,
    pub skipped_subjects: Vec<String>,
    pub failed_subjects: Vec<String>,
    pub failure_policy: String,
}

impl CohortReport {
    /// `"ok"` when at least one subject was computed, otherwise `"empty"`.
    pub fn status(&self) -> &'static str {
        if self.computed > 0 {
            "ok"
        } else {
            "empty"
        }
    }
}

/// Runs the Pi10 pipeline over a cohort directory.
pub struct CohortDispatcher {
    config: CohortConfig,
    loader: Arc<dyn AirwayTreeLoader>,
}

impl CohortDispatcher {
    /// Creates a dispatcher reading trees with a [`FileTreeLoader`] for the
    /// configured tree file.
    pub fn new(config: CohortConfig) -> Self {
        let loader = Arc::new(FileTreeLoader::new(config.tree_file.clone()));
        Self { config, loader }
    }

    /// Creates a dispatcher with a custom tree loader.
    pub fn with_loader(config: CohortConfig, loader: Arc<dyn AirwayTreeLoader>) -> Self {
        Self { config, loader }
    }

    pub fn config(&self) -> &CohortConfig {
        &self.config
    }

    /// Discovers subjects under `root` and computes every subject's outcome.
    ///
    /// The returned outcomes are in sorted subject order.
    ///
    /// # Errors
    ///
    /// Returns `CohortError` for an invalid configuration or an unreadable
    /// root. Per-subject problems never surface here.
    pub async fn compute(&self, root: &Path) -> Result<Vec<SubjectOutcome>, CohortError> {
        self.config.validate()?;
        let subjects = discover_subjects(root)?;
        info!(
            root = %root.display(),
            subjects = subjects.len(),
            workers = self.config.workers,
            "Dispatching Pi10 computation"
        );

        let counters = ProgressCounters::new();
        let monitor = ProgressMonitor::start(
            counters.clone(),
            subjects.len(),
            self.config.progress_interval,
        );
        let outcomes = self.gather(subjects, &counters).await;
        monitor.stop().await;

        Ok(outcomes)
    }

    async fn gather(
        &self,
        subjects: Vec<SubjectDir>,
        counters: &ProgressCounters,
    ) -> Vec<SubjectOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let timeout = self.config.subject_timeout;
        let mut handles = Vec::with_capacity(subjects.len());

        for subject in subjects {
            let sem = Arc::clone(&semaphore);
            let loader = Arc::clone(&self.loader);
            let counters = counters.clone();
            let subject_id = subject.id.clone();

            let handle = tokio::spawn(async move {
                let outcome = match sem.acquire_owned().await {
                    Ok(permit) => run_subject(loader, subject, timeout, permit).await,
                    Err(e) => SubjectOutcome::failed(&subject.id, e.to_string()),
                };
                counters.record(&outcome);
                outcome
            });
            handles.push((subject_id, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (subject_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(subject = %subject_id, error = %e, "Subject task aborted");
                    SubjectOutcome::failed(subject_id, e.to_string())
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Builds the Pi10 table from gathered outcomes.
    ///
    /// Skipped subjects are omitted; failed subjects are kept as a row with
    /// empty indices or omitted, according to the failure policy.
    pub fn assemble(&self, outcomes: &[SubjectOutcome]) -> Result<CohortTable, ExportError> {
        let mut columns = vec![SUBJECT_ID_COLUMN];
        columns.extend(SubsetPolicy::ALL.iter().map(|p| p.column_name()));
        let mut table = CohortTable::new(columns);

        for outcome in outcomes {
            match outcome {
                SubjectOutcome::Computed(result) => {
                    let mut row = vec![Some(result.subject_id.clone())];
                    row.extend(
                        result
                            .estimates()
                            .iter()
                            .map(|e| e.value().map(|v| v.to_string())),
                    );
                    table.push_row(row)?;
                }
                SubjectOutcome::Failed { subject_id, .. } => {
                    if self.config.failure_policy == FailurePolicy::NullRow {
                        let mut row = vec![Some(subject_id.clone())];
                        row.extend(SubsetPolicy::ALL.iter().map(|_| None));
                        table.push_row(row)?;
                    }
                }
                SubjectOutcome::Skipped { .. } => {}
            }
        }

        Ok(table)
    }

    /// Computes Pi10 for every subject under `root` and writes one CSV.
    ///
    /// # Errors
    ///
    /// Fails only on invalid input/configuration or when the output cannot
    /// be written.
    pub async fn run(&self, root: &Path, output: &Path) -> Result<CohortReport, CohortError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let outcomes = self.compute(root).await?;
        let table = self.assemble(&outcomes)?;
        table.write_csv(output, &self.config.missing_value)?;

        let report = self.report(root, output, &outcomes, &table, started_at, start.elapsed());
        info!(
            computed = report.computed,
            skipped = report.skipped,
            failed = report.failed,
            rows = report.rows_written,
            elapsed_ms = report.elapsed_ms,
            "Pi10 computation complete"
        );
        if report.computed == 0 {
            warn!(
                discovered = report.discovered,
                "No subject produced a Pi10 result"
            );
        }
        Ok(report)
    }

    fn report(
        &self,
        root: &Path,
        output: &Path,
        outcomes: &[SubjectOutcome],
        table: &CohortTable,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> CohortReport {
        let mut undefined: BTreeMap<String, usize> = SubsetPolicy::ALL
            .iter()
            .map(|p| (p.column_name().to_string(), 0))
            .collect();
        let mut computed = 0;
        let mut skipped_subjects = Vec::new();
        let mut failed_subjects = Vec::new();

        for outcome in outcomes {
            match outcome {
                SubjectOutcome::Computed(result) => {
                    computed += 1;
                    for policy in SubsetPolicy::ALL {
                        if !result.estimate(policy).is_defined() {
                            *undefined.entry(policy.column_name().to_string()).or_default() += 1;
                        }
                    }
                }
                SubjectOutcome::Skipped { subject_id } => skipped_subjects.push(subject_id.clone()),
                SubjectOutcome::Failed { subject_id, .. } => {
                    failed_subjects.push(subject_id.clone())
                }
            }
        }

        CohortReport {
            input_dir: root.to_path_buf(),
            output_file: output.to_path_buf(),
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            discovered: outcomes.len(),
            computed,
            skipped: skipped_subjects.len(),
            failed: failed_subjects.len(),
            rows_written: table.row_count(),
            undefined,
            skipped_subjects,
            failed_subjects,
            failure_policy: self.config.failure_policy.to_string(),
        }
    }
}

/// Runs one subject on the blocking pool under a time limit.
///
/// The pool permit moves into the blocking closure and is released only
/// when the computation returns. On timeout the subject is reported as
/// failed at once, but its slot stays taken until the detached thread
/// finishes.
async fn run_subject(
    loader: Arc<dyn AirwayTreeLoader>,
    subject: SubjectDir,
    timeout: Duration,
    permit: OwnedSemaphorePermit,
) -> SubjectOutcome {
    let subject_id = subject.id.clone();
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        process_subject(loader.as_ref(), &subject)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            let reason = if e.is_panic() {
                "worker panicked".to_string()
            } else {
                e.to_string()
            };
            error!(subject = %subject_id, error = %reason, "Subject worker crashed");
            SubjectOutcome::failed(subject_id, reason)
        }
        Err(_) => {
            warn!(subject = %subject_id, timeout_secs = timeout.as_secs_f64(), "Subject timed out");
            SubjectOutcome::failed(subject_id, format!("timed out after {:?}", timeout))
        }
    }
}
