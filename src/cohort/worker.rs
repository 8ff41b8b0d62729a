//! Per-subject Pi10 computation.

use tracing::{debug, warn};

use super::discovery::SubjectDir;
use crate::airway::{select, AirwayTreeLoader, SubsetPolicy};
use crate::pi10::{calc_pi10, Pi10Estimate, Pi10Result};

/// Result of processing one subject.
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectOutcome {
    /// All three indices were evaluated (each may still be undefined).
    Computed(Pi10Result),
    /// The subject has no airway-tree artifact.
    Skipped { subject_id: String },
    /// Loading failed, the worker panicked, or it ran out of time.
    Failed { subject_id: String, error: String },
}

impl SubjectOutcome {
    pub fn subject_id(&self) -> &str {
        match self {
            Self::Computed(result) => &result.subject_id,
            Self::Skipped { subject_id } | Self::Failed { subject_id, .. } => subject_id,
        }
    }

    pub fn failed(subject_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failed {
            subject_id: subject_id.into(),
            error: error.into(),
        }
    }
}

/// Loads one subject's tree and computes Pi10 under every subset policy.
///
/// Never panics on bad data: loader errors become [`SubjectOutcome::Failed`]
/// and degenerate subsets become undefined estimates.
pub fn process_subject(loader: &dyn AirwayTreeLoader, subject: &SubjectDir) -> SubjectOutcome {
    let tree = match loader.load(&subject.path, &subject.id) {
        Ok(Some(tree)) => tree,
        Ok(None) => {
            warn!(subject = %subject.id, "No airway tree found, skipping subject");
            return SubjectOutcome::Skipped {
                subject_id: subject.id.clone(),
            };
        }
        Err(e) => {
            warn!(subject = %subject.id, error = %e, "Failed to load airway tree");
            return SubjectOutcome::failed(&subject.id, e.to_string());
        }
    };

    let [lumen_diameter, generation_depth, interior_generation_band] =
        SubsetPolicy::ALL.map(|policy| {
            let subset = select(tree.rows(), policy);
            let estimate = calc_pi10(&subset);
            if let Pi10Estimate::Undefined(reason) = estimate {
                debug!(
                    subject = %subject.id,
                    policy = %policy,
                    segments = subset.len(),
                    reason = %reason,
                    "Pi10 undefined for subset"
                );
            }
            estimate
        });

    SubjectOutcome::Computed(Pi10Result {
        subject_id: subject.id.clone(),
        lumen_diameter,
        generation_depth,
        interior_generation_band,
    })
}
