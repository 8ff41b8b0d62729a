//! Error types for pi10-cohort operations.
//!
//! Defines error types for each stage of the cohort pipelines:
//! - Airway-tree loading
//! - Summary record parsing
//! - Cohort table export
//! - Cohort dispatch
//! - Segmentation correction call-outs
//!
//! Per-subject errors (`TreeLoadError`, `SummaryError`, `CorrectionError`)
//! are contained by the pipelines and only logged. `ExportError` and
//! `CohortError` are the ones that reach the command line.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cohort::ConfigError;

/// Errors that can occur while loading a subject's airway tree.
#[derive(Debug, Error)]
pub enum TreeLoadError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON parse error in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed airway segment at row {row} of '{path}': {source}")]
    Malformed {
        path: PathBuf,
        row: usize,
        #[source]
        source: SegmentError,
    },

    #[error("Airway tree '{0}' contains no segments")]
    Empty(PathBuf),
}

/// A segment row that violates the airway-tree data model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("generation must be a non-negative integer, got {0}")]
    InvalidGeneration(f64),

    #[error("inner_radius must be positive and finite, got {0}")]
    InvalidRadius(f64),

    #[error("wall_global_area must be non-negative and finite, got {0}")]
    InvalidWallArea(f64),
}

/// Errors that can occur while reading a per-subject summary record.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Summary record '{0}' is not a JSON object")]
    NotAnObject(PathBuf),

    #[error("Field '{field}' in '{path}' is not a scalar value")]
    NestedValue { path: PathBuf, field: String },
}

/// Errors that can occur while writing a cohort table.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Row {row} has {actual} cells but the table has {expected} columns")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Output path '{0}' has no parent directory")]
    InvalidOutputPath(PathBuf),

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to move table into place at '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a whole cohort run.
#[derive(Debug, Error)]
pub enum CohortError {
    #[error("Input directory does not exist: {0}")]
    InputNotFound(PathBuf),

    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to list subject directories in '{path}': {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("No subjects produced a result out of {discovered} discovered")]
    NoSubjectsComputed { discovered: usize },
}

/// Errors reported by a segmentation correction collaborator.
#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing correction input '{0}'")]
    MissingInput(String),

    #[error("Correction exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Correction timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_load_error_display() {
        let err = TreeLoadError::Malformed {
            path: PathBuf::from("S1/airway_tree.csv"),
            row: 3,
            source: SegmentError::InvalidRadius(-1.0),
        };
        let msg = err.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("S1/airway_tree.csv"));
        assert!(msg.contains("inner_radius"));
    }

    #[test]
    fn test_cohort_error_from_export() {
        let err: CohortError = ExportError::InvalidOutputPath(PathBuf::from("/")).into();
        assert!(matches!(err, CohortError::Export(_)));
        assert!(err.to_string().contains("Export failed"));
    }

    #[test]
    fn test_correction_error_display() {
        let err = CorrectionError::NonZeroExit {
            code: Some(2),
            stderr: "bad volume".to_string(),
        };
        assert!(err.to_string().contains("Some(2)"));
        assert!(err.to_string().contains("bad volume"));
    }
}
