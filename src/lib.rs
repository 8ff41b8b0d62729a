//! pi10-cohort: airway wall thickness (Pi10) over a cohort of CT subjects.
//!
//! The library reads per-subject airway-tree measurements, fits the
//! square-root wall area against internal perimeter for three airway
//! subsets, and writes one cohort-wide table. It also unions per-subject
//! summary records and drives an external segmentation correction program.

pub mod airway;
pub mod cli;
pub mod cohort;
pub mod correction;
pub mod error;
pub mod export;
pub mod pi10;
pub mod summary;

// Re-export commonly used error types
pub use error::{
    CohortError, CorrectionError, ExportError, SegmentError, SummaryError, TreeLoadError,
};
