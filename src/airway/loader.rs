//! Loading of per-subject airway-tree artifacts.
//!
//! The pipelines only depend on the [`AirwayTreeLoader`] trait. The bundled
//! [`FileTreeLoader`] reads a tabular export of the tree: either CSV with a
//! header row or a JSON array of records. Both must carry the columns
//! `generation`, `inner_radius` and `wall_global_area`; any other columns
//! are ignored.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::{AirwaySegmentRow, SubjectTree};
use crate::cohort::DEFAULT_TREE_FILE;
use crate::error::{SegmentError, TreeLoadError};

/// Source of airway trees for the Pi10 pipeline.
///
/// `Ok(None)` means the subject has no tree artifact, which the dispatcher
/// treats as a skip rather than a failure.
pub trait AirwayTreeLoader: Send + Sync {
    fn load(
        &self,
        subject_dir: &Path,
        subject_id: &str,
    ) -> Result<Option<SubjectTree>, TreeLoadError>;
}

/// Loads trees from a named CSV or JSON file inside each subject directory.
#[derive(Debug, Clone)]
pub struct FileTreeLoader {
    file_name: String,
}

impl FileTreeLoader {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn artifact_path(&self, subject_dir: &Path) -> PathBuf {
        subject_dir.join(&self.file_name)
    }
}

impl Default for FileTreeLoader {
    fn default() -> Self {
        Self::new(DEFAULT_TREE_FILE)
    }
}

impl AirwayTreeLoader for FileTreeLoader {
    fn load(
        &self,
        subject_dir: &Path,
        subject_id: &str,
    ) -> Result<Option<SubjectTree>, TreeLoadError> {
        let path = self.artifact_path(subject_dir);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = if is_json(&path) {
            read_json_segments(&path)?
        } else {
            read_csv_segments(&path)?
        };

        if raw.is_empty() {
            return Err(TreeLoadError::Empty(path));
        }

        let rows = raw
            .into_iter()
            .enumerate()
            .map(|(idx, segment)| segment.into_row(&path, idx + 1))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(subject = %subject_id, segments = rows.len(), path = %path.display(), "Loaded airway tree");
        Ok(Some(SubjectTree::new(subject_id, rows)))
    }
}

/// Segment as it appears on disk. Generation is read as a float because
/// tabular exports frequently write integer columns as `3.0`.
#[derive(Debug, Deserialize)]
struct RawSegment {
    generation: f64,
    inner_radius: f64,
    wall_global_area: f64,
}

impl RawSegment {
    fn into_row(self, path: &Path, row: usize) -> Result<AirwaySegmentRow, TreeLoadError> {
        let malformed = |source: SegmentError| TreeLoadError::Malformed {
            path: path.to_path_buf(),
            row,
            source,
        };

        if !self.generation.is_finite()
            || self.generation < 0.0
            || self.generation.fract() != 0.0
            || self.generation > u32::MAX as f64
        {
            return Err(malformed(SegmentError::InvalidGeneration(self.generation)));
        }

        let segment = AirwaySegmentRow::new(
            self.generation as u32,
            self.inner_radius,
            self.wall_global_area,
        );
        segment.check().map_err(malformed)?;
        Ok(segment)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn read_csv_segments(path: &Path) -> Result<Vec<RawSegment>, TreeLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| TreeLoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    reader
        .deserialize()
        .collect::<Result<Vec<RawSegment>, _>>()
        .map_err(|source| TreeLoadError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn read_json_segments(path: &Path) -> Result<Vec<RawSegment>, TreeLoadError> {
    let file = File::open(path).map_err(|source| TreeLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| TreeLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = TempDir::new().unwrap();
        let loader = FileTreeLoader::default();
        assert!(loader.load(dir.path(), "S1").unwrap().is_none());
    }

    #[test]
    fn test_load_csv_ignores_extra_columns() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "airway_tree.csv",
            "branch,generation,inner_radius,wall_global_area,lobe\n\
             0,0,8.0,120.5,trachea\n\
             1,1.0,5.5,60.0,RUL\n",
        );

        let tree = FileTreeLoader::default()
            .load(dir.path(), "S1")
            .unwrap()
            .unwrap();
        assert_eq!(tree.subject_id(), "S1");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.rows()[1], AirwaySegmentRow::new(1, 5.5, 60.0));
    }

    #[test]
    fn test_load_json_records() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "tree.json",
            r#"[{"generation": 2, "inner_radius": 1.5, "wall_global_area": 10.0, "extra": "x"}]"#,
        );

        let tree = FileTreeLoader::new("tree.json")
            .load(dir.path(), "S2")
            .unwrap()
            .unwrap();
        assert_eq!(tree.rows(), &[AirwaySegmentRow::new(2, 1.5, 10.0)]);
    }

    #[test]
    fn test_header_only_csv_is_empty_error() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "airway_tree.csv",
            "generation,inner_radius,wall_global_area\n",
        );
        let err = FileTreeLoader::default().load(dir.path(), "S1").unwrap_err();
        assert!(matches!(err, TreeLoadError::Empty(_)));
    }

    #[test]
    fn test_invalid_row_is_malformed() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "airway_tree.csv",
            "generation,inner_radius,wall_global_area\n0,2.0,4.0\n1.5,2.0,4.0\n",
        );
        match FileTreeLoader::default().load(dir.path(), "S1").unwrap_err() {
            TreeLoadError::Malformed { row, source, .. } => {
                assert_eq!(row, 2);
                assert_eq!(source, SegmentError::InvalidGeneration(1.5));
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_radius_is_malformed() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "airway_tree.csv",
            "generation,inner_radius,wall_global_area\n0,-1.0,4.0\n",
        );
        let err = FileTreeLoader::default().load(dir.path(), "S1").unwrap_err();
        assert!(err.to_string().contains("inner_radius"));
    }

    #[test]
    fn test_unparseable_csv_is_csv_error() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "airway_tree.csv",
            "generation,inner_radius,wall_global_area\n0,wide,4.0\n",
        );
        let err = FileTreeLoader::default().load(dir.path(), "S1").unwrap_err();
        assert!(matches!(err, TreeLoadError::Csv { .. }));
    }
}
