//! Command-line interface for pi10-cohort.
//!
//! Provides the `compute-pi10`, `aggregate-summaries` and `correct-volumes`
//! commands.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
