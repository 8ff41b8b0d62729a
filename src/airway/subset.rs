//! Anatomical-extent filters applied to a subject tree before regression.

use std::fmt;

use super::AirwaySegmentRow;

/// Minimum internal perimeter kept by [`SubsetPolicy::LumenDiameter`].
pub const MIN_LUMEN_PERIMETER: f64 = 6.0;

/// Deepest generation kept by the generation-based policies.
pub const MAX_GENERATION: u32 = 5;

/// One of the three subsets a Pi10 index is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsetPolicy {
    /// Segments whose internal perimeter is at least 6 units.
    LumenDiameter,
    /// Segments of generation 0 through 5.
    GenerationDepth,
    /// Segments of generation 1 through 5 (trachea excluded).
    InteriorGenerationBand,
}

impl SubsetPolicy {
    /// All policies, in output column order.
    pub const ALL: [SubsetPolicy; 3] = [
        SubsetPolicy::LumenDiameter,
        SubsetPolicy::GenerationDepth,
        SubsetPolicy::InteriorGenerationBand,
    ];

    /// Whether a row belongs to this subset.
    pub fn keeps(&self, row: &AirwaySegmentRow) -> bool {
        match self {
            Self::LumenDiameter => row.internal_perimeter() >= MIN_LUMEN_PERIMETER,
            Self::GenerationDepth => row.generation <= MAX_GENERATION,
            Self::InteriorGenerationBand => row.generation > 0 && row.generation <= MAX_GENERATION,
        }
    }

    /// Kebab-case name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LumenDiameter => "lumen-diameter",
            Self::GenerationDepth => "generation-depth",
            Self::InteriorGenerationBand => "interior-generation-band",
        }
    }

    /// Header of the output column holding this policy's index.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::LumenDiameter => "pi10_lumen_diameter",
            Self::GenerationDepth => "pi10_generation_depth",
            Self::InteriorGenerationBand => "pi10_interior_generation_band",
        }
    }
}

impl fmt::Display for SubsetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the rows kept by `policy`, preserving their relative order.
///
/// An empty result is valid; the regression engine reports it as undefined.
pub fn select(rows: &[AirwaySegmentRow], policy: SubsetPolicy) -> Vec<AirwaySegmentRow> {
    rows.iter().filter(|row| policy.keeps(row)).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn radius_for_perimeter(perimeter: f64) -> f64 {
        perimeter / (2.0 * PI)
    }

    fn sample_rows() -> Vec<AirwaySegmentRow> {
        (0..=7)
            .map(|g| AirwaySegmentRow::new(g, radius_for_perimeter(12.0 - g as f64), 4.0 + g as f64))
            .collect()
    }

    #[test]
    fn test_lumen_diameter_threshold() {
        let rows = vec![
            AirwaySegmentRow::new(3, radius_for_perimeter(5.9), 1.0),
            AirwaySegmentRow::new(4, radius_for_perimeter(6.5), 1.0),
            AirwaySegmentRow::new(9, radius_for_perimeter(20.0), 1.0),
        ];
        let kept = select(&rows, SubsetPolicy::LumenDiameter);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].generation, 4);
        assert_eq!(kept[1].generation, 9);
    }

    #[test]
    fn test_generation_depth_includes_trachea() {
        let kept = select(&sample_rows(), SubsetPolicy::GenerationDepth);
        let generations: Vec<u32> = kept.iter().map(|r| r.generation).collect();
        assert_eq!(generations, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_interior_band_excludes_trachea() {
        let kept = select(&sample_rows(), SubsetPolicy::InteriorGenerationBand);
        let generations: Vec<u32> = kept.iter().map(|r| r.generation).collect();
        assert_eq!(generations, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_select_preserves_order() {
        let rows = vec![
            AirwaySegmentRow::new(5, 1.0, 1.0),
            AirwaySegmentRow::new(9, 1.0, 1.0),
            AirwaySegmentRow::new(2, 1.0, 2.0),
            AirwaySegmentRow::new(0, 1.0, 3.0),
        ];
        let kept = select(&rows, SubsetPolicy::GenerationDepth);
        let generations: Vec<u32> = kept.iter().map(|r| r.generation).collect();
        assert_eq!(generations, vec![5, 2, 0]);
    }

    #[test]
    fn test_select_can_be_empty() {
        let rows = vec![AirwaySegmentRow::new(0, radius_for_perimeter(1.0), 1.0)];
        assert!(select(&rows, SubsetPolicy::LumenDiameter).is_empty());
        assert!(select(&rows, SubsetPolicy::InteriorGenerationBand).is_empty());
        assert!(select(&[], SubsetPolicy::GenerationDepth).is_empty());
    }

    #[test]
    fn test_column_names() {
        let names: Vec<&str> = SubsetPolicy::ALL.iter().map(|p| p.column_name()).collect();
        assert_eq!(
            names,
            vec![
                "pi10_lumen_diameter",
                "pi10_generation_depth",
                "pi10_interior_generation_band"
            ]
        );
        assert_eq!(SubsetPolicy::InteriorGenerationBand.to_string(), "interior-generation-band");
    }
}
