//! Configuration for the cohort pipelines.
//!
//! Holds the worker pool size, per-subject timeout, artifact file names,
//! the policy applied to failed subjects, and output formatting options.
//! Values come from defaults, then environment variables, then CLI flags.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default number of subjects processed concurrently.
pub const DEFAULT_WORKERS: usize = 8;

/// Default per-subject time limit.
pub const DEFAULT_SUBJECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default airway-tree artifact inside each subject directory.
pub const DEFAULT_TREE_FILE: &str = "airway_tree.csv";

/// Default summary record artifact inside each subject directory.
pub const DEFAULT_SUMMARY_FILE: &str = "bp_summary_redcap.json";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// What the dispatcher does with a subject whose computation failed.
///
/// Subjects whose airway-tree artifact is absent are always omitted; this
/// policy only covers load errors, panics and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep a row with the subject id and empty Pi10 cells.
    #[default]
    NullRow,
    /// Drop the subject from the output table.
    Omit,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "null-row" | "null" => Ok(Self::NullRow),
            "omit" | "skip" => Ok(Self::Omit),
            other => Err(ConfigError::InvalidValue {
                key: "failure_policy".to_string(),
                message: format!("expected 'null-row' or 'omit', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullRow => write!(f, "null-row"),
            Self::Omit => write!(f, "omit"),
        }
    }
}

/// Configuration shared by the cohort pipelines.
#[derive(Debug, Clone)]
pub struct CohortConfig {
    /// Maximum number of subjects processed concurrently.
    pub workers: usize,
    /// Time limit for a single subject's computation.
    pub subject_timeout: Duration,
    /// File name of the airway-tree artifact in each subject directory.
    pub tree_file: String,
    /// File name of the summary record in each subject directory.
    pub summary_file: String,
    /// Handling of failed subjects in the Pi10 table.
    pub failure_policy: FailurePolicy,
    /// Token written for missing or undefined cells.
    pub missing_value: String,
    /// How often the progress monitor logs while subjects are running.
    pub progress_interval: Duration,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            subject_timeout: DEFAULT_SUBJECT_TIMEOUT,
            tree_file: DEFAULT_TREE_FILE.to_string(),
            summary_file: DEFAULT_SUMMARY_FILE.to_string(),
            failure_policy: FailurePolicy::default(),
            missing_value: String::new(),
            progress_interval: Duration::from_secs(10),
        }
    }
}

impl CohortConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PI10_WORKERS`: Concurrent subjects (default: 8)
    /// - `PI10_SUBJECT_TIMEOUT_SECS`: Per-subject timeout in seconds (default: 300)
    /// - `PI10_TREE_FILE`: Airway-tree file name (default: airway_tree.csv)
    /// - `PI10_SUMMARY_FILE`: Summary record file name (default: bp_summary_redcap.json)
    /// - `PI10_FAILURE_POLICY`: `null-row` or `omit` (default: null-row)
    /// - `PI10_MISSING_VALUE`: Token for missing cells (default: empty)
    /// - `PI10_PROGRESS_INTERVAL_SECS`: Progress log interval (default: 10)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Split out from [`CohortConfig::from_env`] so tests do not have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("PI10_WORKERS") {
            config.workers = parse_env_value(&val, "PI10_WORKERS")?;
        }

        if let Some(val) = lookup("PI10_SUBJECT_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "PI10_SUBJECT_TIMEOUT_SECS")?;
            config.subject_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("PI10_TREE_FILE") {
            config.tree_file = val;
        }

        if let Some(val) = lookup("PI10_SUMMARY_FILE") {
            config.summary_file = val;
        }

        if let Some(val) = lookup("PI10_FAILURE_POLICY") {
            config.failure_policy = val.parse()?;
        }

        if let Some(val) = lookup("PI10_MISSING_VALUE") {
            config.missing_value = val;
        }

        if let Some(val) = lookup("PI10_PROGRESS_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "PI10_PROGRESS_INTERVAL_SECS")?;
            config.progress_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ValidationFailed(
                "workers must be greater than 0".to_string(),
            ));
        }

        if self.subject_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "subject_timeout must be greater than 0".to_string(),
            ));
        }

        if self.progress_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "progress_interval must be greater than 0".to_string(),
            ));
        }

        validate_file_name(&self.tree_file, "tree_file")?;
        validate_file_name(&self.summary_file, "summary_file")?;

        if self.missing_value.contains([',', '"', '\n', '\r']) {
            return Err(ConfigError::ValidationFailed(
                "missing_value cannot contain delimiters, quotes or newlines".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder method to set the per-subject timeout.
    pub fn with_subject_timeout(mut self, timeout: Duration) -> Self {
        self.subject_timeout = timeout;
        self
    }

    /// Builder method to set the airway-tree file name.
    pub fn with_tree_file(mut self, name: impl Into<String>) -> Self {
        self.tree_file = name.into();
        self
    }

    /// Builder method to set the summary record file name.
    pub fn with_summary_file(mut self, name: impl Into<String>) -> Self {
        self.summary_file = name.into();
        self
    }

    /// Builder method to set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Builder method to set the missing-value token.
    pub fn with_missing_value(mut self, token: impl Into<String>) -> Self {
        self.missing_value = token.into();
        self
    }

    /// Builder method to set the progress log interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}

fn validate_file_name(name: &str, key: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(format!(
            "{} cannot be empty",
            key
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(ConfigError::ValidationFailed(format!(
            "{} must be a bare file name, got '{}'",
            key, name
        )));
    }
    Ok(())
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CohortConfig::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.subject_timeout, Duration::from_secs(300));
        assert_eq!(config.tree_file, "airway_tree.csv");
        assert_eq!(config.summary_file, "bp_summary_redcap.json");
        assert_eq!(config.failure_policy, FailurePolicy::NullRow);
        assert!(config.missing_value.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CohortConfig::new()
            .with_workers(2)
            .with_subject_timeout(Duration::from_secs(5))
            .with_tree_file("tree.json")
            .with_summary_file("summary.json")
            .with_failure_policy(FailurePolicy::Omit)
            .with_missing_value("NA")
            .with_progress_interval(Duration::from_secs(1));

        assert_eq!(config.workers, 2);
        assert_eq!(config.subject_timeout, Duration::from_secs(5));
        assert_eq!(config.tree_file, "tree.json");
        assert_eq!(config.summary_file, "summary.json");
        assert_eq!(config.failure_policy, FailurePolicy::Omit);
        assert_eq!(config.missing_value, "NA");
        assert_eq!(config.progress_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = CohortConfig::from_lookup(lookup_from(&[
            ("PI10_WORKERS", "3"),
            ("PI10_SUBJECT_TIMEOUT_SECS", "60"),
            ("PI10_TREE_FILE", "tree.json"),
            ("PI10_FAILURE_POLICY", "omit"),
            ("PI10_MISSING_VALUE", "NaN"),
        ]))
        .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.subject_timeout, Duration::from_secs(60));
        assert_eq!(config.tree_file, "tree.json");
        assert_eq!(config.failure_policy, FailurePolicy::Omit);
        assert_eq!(config.missing_value, "NaN");
        assert_eq!(config.summary_file, DEFAULT_SUMMARY_FILE);
    }

    #[test]
    fn test_from_lookup_rejects_unparseable_value() {
        let err = CohortConfig::from_lookup(lookup_from(&[("PI10_WORKERS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("PI10_WORKERS"));
    }

    #[test]
    fn test_from_lookup_validates() {
        let err = CohortConfig::from_lookup(lookup_from(&[("PI10_WORKERS", "0")])).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_validation_invalid_timeout() {
        let config = CohortConfig::default().with_subject_timeout(Duration::ZERO);
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("subject_timeout"));
    }

    #[test]
    fn test_validation_rejects_path_in_file_name() {
        let config = CohortConfig::default().with_tree_file("../airway_tree.csv");
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("tree_file"));

        let config = CohortConfig::default().with_summary_file("");
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("summary_file"));
    }

    #[test]
    fn test_validation_rejects_delimiter_in_missing_value() {
        let config = CohortConfig::default().with_missing_value("a,b");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("null-row".parse::<FailurePolicy>().unwrap(), FailurePolicy::NullRow);
        assert_eq!("OMIT".parse::<FailurePolicy>().unwrap(), FailurePolicy::Omit);
        assert!("drop-everything".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::Omit.to_string(), "omit");
    }
}
