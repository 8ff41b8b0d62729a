//! Cohort-level Pi10 computation.
//!
//! This module fans a cohort directory out to per-subject workers and
//! gathers their results back into one table:
//!
//! - **discovery**: lists subject directories in lexicographic order
//! - **worker**: loads one subject's tree and computes its three Pi10 indices
//! - **dispatcher**: runs workers on a bounded pool and gathers in order
//! - **progress**: shared counters and a periodic progress log
//! - **config**: pool size, timeouts, artifact names, failure policy
//!
//! # Pipeline Flow
//!
//! ```text
//!             ┌──────────────┐
//!             │  discovery   │  sorted subject dirs
//!             └──────┬───────┘
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!   ┌─────────┐ ┌─────────┐ ┌─────────┐
//!   │ worker 1│ │ worker 2│ │ worker N│   (≤ workers at a time)
//!   └────┬────┘ └────┬────┘ └────┬────┘
//!        └───────────┼───────────┘
//!             ┌──────▼───────┐
//!             │ ordered      │  index-aligned with discovery
//!             │ gather       │
//!             └──────┬───────┘
//!             ┌──────▼───────┐
//!             │  CSV write   │  single write
//!             └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pi10_cohort::cohort::{CohortConfig, CohortDispatcher};
//!
//! let dispatcher = CohortDispatcher::new(CohortConfig::from_env()?);
//! let report = dispatcher.run("cohort/".as_ref(), "pi10.csv".as_ref()).await?;
//! println!("{} rows written", report.rows_written);
//! ```

pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod progress;
pub mod worker;

pub use config::{
    CohortConfig, ConfigError, FailurePolicy, DEFAULT_SUBJECT_TIMEOUT, DEFAULT_SUMMARY_FILE,
    DEFAULT_TREE_FILE, DEFAULT_WORKERS,
};
pub use discovery::{discover_subjects, SubjectDir};
pub use dispatcher::{CohortDispatcher, CohortReport, SUBJECT_ID_COLUMN};
pub use progress::{ProgressCounters, ProgressMonitor, ProgressSnapshot};
pub use worker::{process_subject, SubjectOutcome};
