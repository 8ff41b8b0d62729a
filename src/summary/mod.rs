//! Cohort-wide union of per-subject summary records.
//!
//! Each subject directory may hold a flat JSON object of scalar fields
//! (default `bp_summary_redcap.json`). The aggregator tags every record with
//! the subject's directory name under `id` and unions them into one table:
//! `id` first, then every key in first-seen order. Subjects without a record
//! are skipped quietly; records that are not flat objects are skipped with a
//! warning. The run is sequential since the per-subject work is a single
//! small read.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::cohort::{discover_subjects, CohortConfig};
use crate::error::{CohortError, SummaryError};
use crate::export::CohortTable;

/// Column holding the subject identifier in the summary table.
pub const ID_COLUMN: &str = "id";

/// One subject's summary record.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Summary of an `aggregate-summaries` run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub discovered: usize,
    pub aggregated: usize,
    pub missing: usize,
    pub malformed: Vec<String>,
    pub columns: Vec<String>,
    pub rows_written: usize,
}

impl SummaryReport {
    pub fn status(&self) -> &'static str {
        if self.aggregated > 0 {
            "ok"
        } else {
            "empty"
        }
    }
}

/// Reads a summary record and checks it is a flat object of scalars.
pub fn read_summary_record(path: &Path) -> Result<Map<String, Value>, SummaryError> {
    let content = fs::read_to_string(path).map_err(|source| SummaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| SummaryError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Object(fields) = value else {
        return Err(SummaryError::NotAnObject(path.to_path_buf()));
    };

    if let Some((field, _)) = fields
        .iter()
        .find(|(_, v)| matches!(v, Value::Object(_) | Value::Array(_)))
    {
        return Err(SummaryError::NestedValue {
            path: path.to_path_buf(),
            field: field.clone(),
        });
    }

    Ok(fields)
}

/// Renders a scalar JSON value as a table cell; `null` becomes empty.
fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        // Nested values are rejected when the record is read.
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Sequential summary record aggregator.
pub struct SummaryAggregator {
    config: CohortConfig,
}

/// Records collected from a cohort plus the subjects left out.
#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<SummaryRecord>,
    pub discovered: usize,
    pub missing: usize,
    pub malformed: Vec<String>,
}

impl SummaryAggregator {
    pub fn new(config: CohortConfig) -> Self {
        Self { config }
    }

    /// Reads every subject's record in sorted subject order.
    pub fn collect(&self, root: &Path) -> Result<Collected, CohortError> {
        self.config.validate()?;
        let subjects = discover_subjects(root)?;
        let mut collected = Collected {
            discovered: subjects.len(),
            ..Default::default()
        };

        for subject in subjects {
            let path = subject.path.join(&self.config.summary_file);
            if !path.is_file() {
                debug!(subject = %subject.id, "No summary record, skipping");
                collected.missing += 1;
                continue;
            }

            match read_summary_record(&path) {
                Ok(fields) => {
                    collected.records.push(SummaryRecord {
                        id: subject.id,
                        fields,
                    });
                }
                Err(e) => {
                    warn!(subject = %subject.id, error = %e, "Malformed summary record, skipping");
                    collected.malformed.push(subject.id);
                }
            }
        }

        Ok(collected)
    }

    /// Unions records into one table.
    ///
    /// The directory name wins over any `id` field inside a record.
    pub fn build_table(records: &[SummaryRecord]) -> Result<CohortTable, CohortError> {
        let mut columns: Vec<String> = vec![ID_COLUMN.to_string()];
        for record in records {
            for key in record.fields.keys() {
                if key != ID_COLUMN && !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = CohortTable::new(columns.clone());
        for record in records {
            let row = columns
                .iter()
                .map(|column| {
                    if column == ID_COLUMN {
                        Some(record.id.clone())
                    } else {
                        record.fields.get(column).and_then(render_scalar)
                    }
                })
                .collect();
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Aggregates every summary record under `root` into one CSV.
    pub fn run(&self, root: &Path, output: &Path) -> Result<SummaryReport, CohortError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let collected = self.collect(root)?;
        let table = Self::build_table(&collected.records)?;
        table.write_csv(output, &self.config.missing_value)?;

        let report = SummaryReport {
            input_dir: root.to_path_buf(),
            output_file: output.to_path_buf(),
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            discovered: collected.discovered,
            aggregated: collected.records.len(),
            missing: collected.missing,
            malformed: collected.malformed,
            columns: table.columns().to_vec(),
            rows_written: table.row_count(),
        };

        info!(
            aggregated = report.aggregated,
            missing = report.missing,
            malformed = report.malformed.len(),
            columns = report.columns.len(),
            "Summary aggregation complete"
        );
        if report.aggregated == 0 {
            warn!(discovered = report.discovered, "No summary records aggregated");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn subject(root: &Path, id: &str, summary: Option<&str>) {
        let dir = root.join(id);
        fs::create_dir(&dir).unwrap();
        if let Some(content) = summary {
            fs::write(dir.join("bp_summary_redcap.json"), content).unwrap();
        }
    }

    fn aggregator() -> SummaryAggregator {
        SummaryAggregator::new(CohortConfig::default())
    }

    #[test]
    fn test_schema_is_union_of_keys() {
        let root = TempDir::new().unwrap();
        subject(root.path(), "A", Some(r#"{"weight": 70, "height": 1.8}"#));
        subject(root.path(), "B", Some(r#"{"weight": 82.5, "age": 61}"#));

        let collected = aggregator().collect(root.path()).unwrap();
        let table = SummaryAggregator::build_table(&collected.records).unwrap();

        assert_eq!(table.columns(), &["id", "weight", "height", "age"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, "id"), Some("A"));
        assert_eq!(table.cell(0, "height"), Some("1.8"));
        assert_eq!(table.cell(0, "age"), None);
        assert_eq!(table.cell(1, "weight"), Some("82.5"));
        assert_eq!(table.cell(1, "height"), None);
        assert_eq!(table.cell(1, "age"), Some("61"));
    }

    #[test]
    fn test_missing_and_malformed_records_are_skipped() {
        let root = TempDir::new().unwrap();
        subject(root.path(), "S1", Some(r#"{"bp_pi10": 3.7}"#));
        subject(root.path(), "S2", None);
        subject(root.path(), "S3", Some("not json"));
        subject(root.path(), "S4", Some(r#"{"lobes": {"RUL": 1}}"#));
        subject(root.path(), "S5", Some("[1, 2]"));

        let collected = aggregator().collect(root.path()).unwrap();
        assert_eq!(collected.discovered, 5);
        assert_eq!(collected.records.len(), 1);
        assert_eq!(collected.records[0].id, "S1");
        assert_eq!(collected.missing, 1);
        assert_eq!(collected.malformed, vec!["S3", "S4", "S5"]);
    }

    #[test]
    fn test_directory_name_overrides_record_id() {
        let root = TempDir::new().unwrap();
        subject(root.path(), "S1", Some(r#"{"id": "wrong", "gender": "Male"}"#));

        let collected = aggregator().collect(root.path()).unwrap();
        let table = SummaryAggregator::build_table(&collected.records).unwrap();
        assert_eq!(table.columns(), &["id", "gender"]);
        assert_eq!(table.cell(0, "id"), Some("S1"));
    }

    #[test]
    fn test_scalar_rendering() {
        assert_eq!(render_scalar(&Value::Null), None);
        assert_eq!(render_scalar(&Value::Bool(true)), Some("true".to_string()));
        assert_eq!(render_scalar(&serde_json::json!(12)), Some("12".to_string()));
        assert_eq!(render_scalar(&serde_json::json!("F")), Some("F".to_string()));
    }

    #[test]
    fn test_run_writes_csv_in_sorted_order() {
        let root = TempDir::new().unwrap();
        subject(root.path(), "S2", Some(r#"{"weight": 60, "smoker": null}"#));
        subject(root.path(), "S1", Some(r#"{"weight": 70}"#));
        let out = TempDir::new().unwrap();
        let output = out.path().join("summary.csv");

        let report = aggregator().run(root.path(), &output).unwrap();
        assert_eq!(report.aggregated, 2);
        assert_eq!(report.status(), "ok");

        let csv = fs::read_to_string(&output).unwrap();
        assert_eq!(csv, "id,weight,smoker\nS1,70,\nS2,60,\n");
    }

    #[test]
    fn test_empty_cohort_writes_id_header() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let output = out.path().join("summary.csv");

        let report = aggregator().run(root.path(), &output).unwrap();
        assert_eq!(report.status(), "empty");
        assert_eq!(fs::read_to_string(&output).unwrap(), "id\n");
    }
}
