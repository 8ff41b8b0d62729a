//! Pi10 airway wall thickness index.
//!
//! Pi10 is the square root of the airway wall area at a standardized internal
//! perimeter of 10 units. For each segment in a subset the engine computes
//! `x = 2π × inner_radius` and `y = sqrt(wall_global_area)`, fits an
//! ordinary least-squares line through the pairs and evaluates it at `x = 10`.
//!
//! Subsets that cannot support a line (empty, a single segment, or all
//! segments sharing one perimeter) produce [`Pi10Estimate::Undefined`]
//! instead of an error, so a subject's remaining subsets still get computed.

pub mod regression;

use std::fmt;

use serde::Serialize;

use crate::airway::{AirwaySegmentRow, SubsetPolicy};

pub use regression::{fit_line, FitFailure, LineFit};

/// Internal perimeter at which the fitted line is evaluated.
pub const REFERENCE_PERIMETER: f64 = 10.0;

/// Why a subset has no Pi10 value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    EmptySubset,
    SinglePoint,
    DegeneratePerimeter,
    NonFinite,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::EmptySubset => "no segments in subset",
            Self::SinglePoint => "single segment in subset",
            Self::DegeneratePerimeter => "all segments share one perimeter",
            Self::NonFinite => "non-finite value in regression",
        };
        f.write_str(text)
    }
}

/// Pi10 for one subset: a finite value or an explicit undefined marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pi10Estimate {
    Value(f64),
    Undefined(UndefinedReason),
}

impl Pi10Estimate {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl From<FitFailure> for UndefinedReason {
    fn from(failure: FitFailure) -> Self {
        match failure {
            FitFailure::TooFewPoints(0) => Self::EmptySubset,
            FitFailure::TooFewPoints(_) => Self::SinglePoint,
            FitFailure::ZeroVarianceX => Self::DegeneratePerimeter,
            FitFailure::NonFinite => Self::NonFinite,
        }
    }
}

/// Computes Pi10 over a filtered set of segments.
pub fn calc_pi10(rows: &[AirwaySegmentRow]) -> Pi10Estimate {
    let points: Vec<(f64, f64)> = rows
        .iter()
        .map(|row| (row.internal_perimeter(), row.wall_global_area.sqrt()))
        .collect();

    match fit_line(&points) {
        Ok(fit) => {
            let pi10 = fit.at(REFERENCE_PERIMETER);
            if pi10.is_finite() {
                Pi10Estimate::Value(pi10)
            } else {
                Pi10Estimate::Undefined(UndefinedReason::NonFinite)
            }
        }
        Err(failure) => Pi10Estimate::Undefined(failure.into()),
    }
}

/// Pi10 indices of one subject, one per [`SubsetPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct Pi10Result {
    pub subject_id: String,
    pub lumen_diameter: Pi10Estimate,
    pub generation_depth: Pi10Estimate,
    pub interior_generation_band: Pi10Estimate,
}

impl Pi10Result {
    pub fn estimate(&self, policy: SubsetPolicy) -> Pi10Estimate {
        match policy {
            SubsetPolicy::LumenDiameter => self.lumen_diameter,
            SubsetPolicy::GenerationDepth => self.generation_depth,
            SubsetPolicy::InteriorGenerationBand => self.interior_generation_band,
        }
    }

    /// Estimates in [`SubsetPolicy::ALL`] order.
    pub fn estimates(&self) -> [Pi10Estimate; 3] {
        SubsetPolicy::ALL.map(|policy| self.estimate(policy))
    }
}
