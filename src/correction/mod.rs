//! Segmentation error correction over a cohort.
//!
//! For every subject directory the runner gathers four artifacts (lung
//! volume, airway volume, summary record and airway tree) and hands them to
//! a [`SegmentationCorrector`]. The corrector is an injected collaborator;
//! [`ProcessCorrector`] launches an external program, tests use in-process
//! fakes. Subjects missing an artifact or whose correction fails are logged
//! and the batch moves on.

pub mod process;

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cohort::{discover_subjects, CohortConfig};
use crate::error::{CohortError, CorrectionError};

pub use process::ProcessCorrector;

/// Lung volume artifact expected in each subject directory.
pub const LUNG_VOLUME_FILE: &str = "lung_volume.txt";

/// Airway volume artifact expected in each subject directory.
pub const AIRWAY_VOLUME_FILE: &str = "airway_volume.txt";

/// The four per-subject artifacts a correction run consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionInputs {
    pub subject_id: String,
    pub lung_volume: PathBuf,
    pub airway_volume: PathBuf,
    pub summary: PathBuf,
    pub tree: PathBuf,
}

impl CorrectionInputs {
    /// Paths in the order the correction program expects them.
    pub fn ordered_paths(&self) -> [&Path; 4] {
        [
            self.lung_volume.as_path(),
            self.airway_volume.as_path(),
            self.summary.as_path(),
            self.tree.as_path(),
        ]
    }
}

/// Outcome reported by a corrector for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionStatus {
    pub exit_code: Option<i32>,
    pub output: String,
}

/// Collaborator that corrects one subject's segmentation measurements.
#[async_trait]
pub trait SegmentationCorrector: Send + Sync {
    async fn correct(&self, inputs: &CorrectionInputs) -> Result<CorrectionStatus, CorrectionError>;
}

/// Summary of a `correct-volumes` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionReport {
    pub discovered: usize,
    pub corrected: Vec<String>,
    pub incomplete: Vec<String>,
    pub failed: Vec<String>,
    pub elapsed_ms: u64,
}

/// Locates the four correction inputs.
///
/// # Errors
///
/// `CorrectionError::MissingInput` names the first file that is absent.
pub fn locate_inputs(
    subject_dir: &Path,
    subject_id: &str,
    config: &CohortConfig,
) -> Result<CorrectionInputs, CorrectionError> {
    let find = |name: &str| {
        let path = subject_dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(CorrectionError::MissingInput(name.to_string()))
        }
    };

    Ok(CorrectionInputs {
        subject_id: subject_id.to_string(),
        lung_volume: find(LUNG_VOLUME_FILE)?,
        airway_volume: find(AIRWAY_VOLUME_FILE)?,
        summary: find(&config.summary_file)?,
        tree: find(&config.tree_file)?,
    })
}

/// Runs a corrector over every subject of a cohort, one at a time.
pub struct CorrectionRunner<C: SegmentationCorrector> {
    config: CohortConfig,
    corrector: C,
}

impl<C: SegmentationCorrector> CorrectionRunner<C> {
    pub fn new(config: CohortConfig, corrector: C) -> Self {
        Self { config, corrector }
    }

    /// Corrects every subject under `root` in sorted order.
    ///
    /// # Errors
    ///
    /// Only an invalid configuration or unreadable root fails the run.
    pub async fn run(&self, root: &Path) -> Result<CorrectionReport, CohortError> {
        self.config.validate()?;
        let start = Instant::now();
        let subjects = discover_subjects(root)?;
        let mut report = CorrectionReport {
            discovered: subjects.len(),
            ..Default::default()
        };

        info!(subjects = subjects.len(), "Correcting airway and volume measurements");

        for subject in subjects {
            let inputs = match locate_inputs(&subject.path, &subject.id, &self.config) {
                Ok(inputs) => inputs,
                Err(e) => {
                    error!(subject = %subject.id, error = %e, "Missing correction input, skipping");
                    report.incomplete.push(subject.id);
                    continue;
                }
            };

            match self.corrector.correct(&inputs).await {
                Ok(status) => {
                    info!(subject = %subject.id, exit_code = ?status.exit_code, "Subject corrected");
                    report.corrected.push(subject.id);
                }
                Err(e) => {
                    warn!(subject = %subject.id, error = %e, "Correction failed");
                    report.failed.push(subject.id);
                }
            }
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            corrected = report.corrected.len(),
            incomplete = report.incomplete.len(),
            failed = report.failed.len(),
            "Correction run complete"
        );
        Ok(report)
    }
}
