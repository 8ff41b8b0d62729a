//! Airway-tree measurements for a single subject.
//!
//! - **AirwaySegmentRow**: one measured segment (generation, inner radius, wall area)
//! - **SubjectTree**: the ordered rows of one subject
//! - **SubsetPolicy**: the anatomical-extent filters applied before regression
//! - **AirwayTreeLoader**: the seam through which trees are read from disk

pub mod loader;
pub mod subset;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::SegmentError;

pub use loader::{AirwayTreeLoader, FileTreeLoader};
pub use subset::{select, SubsetPolicy};

/// One measured airway segment within a subject's tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirwaySegmentRow {
    /// Branching depth from the trachea (generation 0).
    pub generation: u32,
    /// Luminal radius of the segment.
    pub inner_radius: f64,
    /// Cross-sectional wall area of the segment.
    pub wall_global_area: f64,
}

impl AirwaySegmentRow {
    pub fn new(generation: u32, inner_radius: f64, wall_global_area: f64) -> Self {
        Self {
            generation,
            inner_radius,
            wall_global_area,
        }
    }

    /// Approximate internal perimeter, `2π × inner_radius`.
    pub fn internal_perimeter(&self) -> f64 {
        self.inner_radius * 2.0 * PI
    }

    /// Checks the row against the data-model invariants.
    pub fn check(&self) -> Result<(), SegmentError> {
        if !self.inner_radius.is_finite() || self.inner_radius <= 0.0 {
            return Err(SegmentError::InvalidRadius(self.inner_radius));
        }
        if !self.wall_global_area.is_finite() || self.wall_global_area < 0.0 {
            return Err(SegmentError::InvalidWallArea(self.wall_global_area));
        }
        Ok(())
    }
}

/// The full ordered sequence of airway segments for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectTree {
    subject_id: String,
    rows: Vec<AirwaySegmentRow>,
}

impl SubjectTree {
    /// Creates a tree. Callers are responsible for the non-empty invariant;
    /// loaders reject empty artifacts before getting here.
    pub fn new(subject_id: impl Into<String>, rows: Vec<AirwaySegmentRow>) -> Self {
        Self {
            subject_id: subject_id.into(),
            rows,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn rows(&self) -> &[AirwaySegmentRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
