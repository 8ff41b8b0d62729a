//! In-memory cohort table and its CSV serialization.
//!
//! Tables are assembled completely in memory and written with a single
//! persist: the CSV is written to a temporary file next to the destination
//! and renamed over it, so a failed run never leaves a truncated table.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::ExportError;

/// A fixed-schema table with optional cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CohortTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl CohortTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Its width must match the header.
    pub fn push_row(&mut self, row: Vec<Option<String>>) -> Result<(), ExportError> {
        if row.len() != self.columns.len() {
            return Err(ExportError::RowWidthMismatch {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Looks up a cell by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Serializes the table as CSV with a header row.
    ///
    /// `None` cells are written as `missing_value`.
    pub fn to_csv_bytes(&self, missing_value: &str) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or(missing_value)))?;
        }
        writer.into_inner().map_err(|e| ExportError::Io {
            path: Default::default(),
            source: e.into_error(),
        })
    }

    /// Writes the table to `output_path` in one step.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal for the run: the destination directory may
    /// be missing or unwritable.
    pub fn write_csv(&self, output_path: &Path, missing_value: &str) -> Result<(), ExportError> {
        let bytes = self.to_csv_bytes(missing_value)?;

        let parent = match output_path.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => return Err(ExportError::InvalidOutputPath(output_path.to_path_buf())),
        };
        if output_path.file_name().is_none() {
            return Err(ExportError::InvalidOutputPath(output_path.to_path_buf()));
        }

        let io_err = |source| ExportError::Io {
            path: output_path.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(output_path).map_err(|e| ExportError::Persist {
            path: output_path.to_path_buf(),
            source: e.error,
        })?;

        tracing::info!(
            path = %output_path.display(),
            rows = self.rows.len(),
            columns = self.columns.len(),
            "Cohort table written"
        );

        Ok(())
    }
}
