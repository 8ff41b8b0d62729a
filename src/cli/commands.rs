//! CLI command definitions for pi10-cohort.
//!
//! Three independent pipelines over a cohort directory that holds one
//! subdirectory per subject:
//!
//! - `compute-pi10`: Pi10 indices per subject, written as one CSV
//! - `aggregate-summaries`: union of per-subject JSON summary records
//! - `correct-volumes`: segmentation correction call-out per subject

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::warn;

use crate::cohort::{CohortConfig, CohortDispatcher, FailurePolicy};
use crate::correction::{CorrectionRunner, ProcessCorrector};
use crate::error::CohortError;
use crate::summary::SummaryAggregator;

/// Airway wall thickness (Pi10) cohort pipeline.
#[derive(Parser)]
#[command(name = "pi10-cohort")]
#[command(about = "Compute Pi10 airway indices and aggregate subject summaries across a cohort")]
#[command(version)]
#[command(
    long_about = "pi10-cohort processes a cohort directory containing one subdirectory per subject.\n\nExample usage:\n  pi10-cohort compute-pi10 ./cohort ./pi10.csv --workers 8\n  pi10-cohort aggregate-summaries ./cohort ./summaries.csv"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Compute Pi10 for every subject and write one CSV table.
    #[command(name = "compute-pi10", alias = "pi10")]
    ComputePi10(ComputePi10Args),

    /// Union every subject's JSON summary record into one CSV table.
    #[command(name = "aggregate-summaries", alias = "summaries")]
    AggregateSummaries(AggregateArgs),

    /// Run the segmentation correction program for every subject.
    #[command(name = "correct-volumes")]
    CorrectVolumes(CorrectArgs),
}

/// Arguments for `pi10-cohort compute-pi10`.
#[derive(Parser, Debug)]
pub struct ComputePi10Args {
    /// Cohort directory with one subdirectory per subject.
    pub input_dir: PathBuf,

    /// Output CSV file.
    pub output_file: PathBuf,

    /// Number of subjects processed concurrently (default: 8).
    #[arg(short = 'w', long, env = "PI10_WORKERS")]
    pub workers: Option<usize>,

    /// Per-subject time limit in seconds (default: 300).
    #[arg(long, env = "PI10_SUBJECT_TIMEOUT_SECS")]
    pub subject_timeout_secs: Option<u64>,

    /// Airway-tree file name inside each subject directory.
    #[arg(long, env = "PI10_TREE_FILE")]
    pub tree_file: Option<String>,

    /// What to do with failed subjects: null-row or omit.
    #[arg(long, env = "PI10_FAILURE_POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Exit with an error when no subject produced a result.
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Print the run report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `pi10-cohort aggregate-summaries`.
#[derive(Parser, Debug)]
pub struct AggregateArgs {
    /// Cohort directory with one subdirectory per subject.
    pub input_dir: PathBuf,

    /// Output CSV file.
    pub output_file: PathBuf,

    /// Summary record file name inside each subject directory.
    #[arg(long, env = "PI10_SUMMARY_FILE")]
    pub summary_file: Option<String>,

    /// Exit with an error when no summary record was found.
    #[arg(long)]
    pub fail_on_empty: bool,

    /// Print the run report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `pi10-cohort correct-volumes`.
#[derive(Parser, Debug)]
pub struct CorrectArgs {
    /// Cohort directory with one subdirectory per subject.
    pub input_dir: PathBuf,

    /// Program launched for each subject.
    #[arg(long, default_value = "python3")]
    pub program: String,

    /// Script passed to the program before the four input paths.
    #[arg(long, default_value = "./flag_potential_seg_errors.py")]
    pub script: PathBuf,

    /// Run the program with the four input paths only, without a script.
    #[arg(long, conflicts_with = "script")]
    pub no_script: bool,

    /// Time limit per subject in seconds.
    #[arg(long, default_value = "600", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Airway-tree file name inside each subject directory.
    #[arg(long, env = "PI10_TREE_FILE")]
    pub tree_file: Option<String>,

    /// Summary record file name inside each subject directory.
    #[arg(long, env = "PI10_SUMMARY_FILE")]
    pub summary_file: Option<String>,

    /// Print the run report as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::ComputePi10(args) => run_compute_command(args).await,
        Commands::AggregateSummaries(args) => run_aggregate_command(args),
        Commands::CorrectVolumes(args) => run_correct_command(args).await,
    }
}

/// Loads environment configuration, then applies flag overrides.
fn base_config() -> anyhow::Result<CohortConfig> {
    CohortConfig::from_env().context("Invalid PI10_* environment configuration")
}

fn print_report<T: Serialize>(report: &T) -> anyhow::Result<()> {
    let json_output = serde_json::to_string_pretty(report)
        .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
    println!("{}", json_output);
    Ok(())
}

async fn run_compute_command(args: ComputePi10Args) -> anyhow::Result<()> {
    let mut config = base_config()?;
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(secs) = args.subject_timeout_secs {
        config = config.with_subject_timeout(Duration::from_secs(secs));
    }
    if let Some(tree_file) = args.tree_file {
        config = config.with_tree_file(tree_file);
    }
    if let Some(policy) = args.failure_policy {
        config = config.with_failure_policy(policy);
    }

    let dispatcher = CohortDispatcher::new(config);
    let report = dispatcher
        .run(&args.input_dir, &args.output_file)
        .await
        .with_context(|| format!("Pi10 computation over {} failed", args.input_dir.display()))?;

    if args.json {
        print_report(&report)?;
    } else {
        println!(
            "Pi10 table written to {} ({} rows; {} computed, {} skipped, {} failed)",
            report.output_file.display(),
            report.rows_written,
            report.computed,
            report.skipped,
            report.failed
        );
    }

    if report.computed == 0 && args.fail_on_empty {
        return Err(CohortError::NoSubjectsComputed {
            discovered: report.discovered,
        }
        .into());
    }
    Ok(())
}

fn run_aggregate_command(args: AggregateArgs) -> anyhow::Result<()> {
    let mut config = base_config()?;
    if let Some(summary_file) = args.summary_file {
        config = config.with_summary_file(summary_file);
    }

    let report = SummaryAggregator::new(config)
        .run(&args.input_dir, &args.output_file)
        .with_context(|| {
            format!(
                "Summary aggregation over {} failed",
                args.input_dir.display()
            )
        })?;

    if args.json {
        print_report(&report)?;
    } else {
        println!(
            "Summary table written to {} ({} rows, {} columns; {} without record, {} malformed)",
            report.output_file.display(),
            report.rows_written,
            report.columns.len(),
            report.missing,
            report.malformed.len()
        );
    }

    if report.aggregated == 0 && args.fail_on_empty {
        return Err(CohortError::NoSubjectsComputed {
            discovered: report.discovered,
        }
        .into());
    }
    Ok(())
}

async fn run_correct_command(args: CorrectArgs) -> anyhow::Result<()> {
    let mut config = base_config()?;
    if let Some(tree_file) = args.tree_file {
        config = config.with_tree_file(tree_file);
    }
    if let Some(summary_file) = args.summary_file {
        config = config.with_summary_file(summary_file);
    }

    let mut corrector =
        ProcessCorrector::new(args.program).with_timeout(Duration::from_secs(args.timeout_secs));
    if !args.no_script {
        corrector = corrector.with_script(args.script);
    }

    let report = CorrectionRunner::new(config, corrector)
        .run(&args.input_dir)
        .await
        .with_context(|| format!("Correction over {} failed", args.input_dir.display()))?;

    if args.json {
        print_report(&report)?;
    } else {
        println!(
            "Corrected {} of {} subjects ({} incomplete, {} failed)",
            report.corrected.len(),
            report.discovered,
            report.incomplete.len(),
            report.failed.len()
        );
    }
    if !report.failed.is_empty() {
        warn!(failed = ?report.failed, "Some subjects could not be corrected");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_compute_command_defaults() {
        let cli = Cli::try_parse_from(["pi10-cohort", "compute-pi10", "cohort", "pi10.csv"])
            .expect("should parse");

        match cli.command {
            Commands::ComputePi10(args) => {
                assert_eq!(args.input_dir, PathBuf::from("cohort"));
                assert_eq!(args.output_file, PathBuf::from("pi10.csv"));
                assert!(!args.fail_on_empty);
                assert!(!args.json);
            }
            _ => panic!("Expected ComputePi10 command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_compute_command_with_options() {
        let cli = Cli::try_parse_from([
            "pi10-cohort",
            "compute-pi10",
            "cohort",
            "pi10.csv",
            "--workers",
            "2",
            "--subject-timeout-secs",
            "30",
            "--failure-policy",
            "omit",
            "--fail-on-empty",
            "-j",
            "--log-level",
            "debug",
        ])
        .expect("should parse");

        match cli.command {
            Commands::ComputePi10(args) => {
                assert_eq!(args.workers, Some(2));
                assert_eq!(args.subject_timeout_secs, Some(30));
                assert_eq!(args.failure_policy, Some(FailurePolicy::Omit));
                assert!(args.fail_on_empty);
                assert!(args.json);
            }
            _ => panic!("Expected ComputePi10 command"),
        }
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_invalid_failure_policy_rejected() {
        let result = Cli::try_parse_from([
            "pi10-cohort",
            "compute-pi10",
            "cohort",
            "pi10.csv",
            "--failure-policy",
            "explode",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_aggregate_command() {
        let cli = Cli::try_parse_from([
            "pi10-cohort",
            "aggregate-summaries",
            "cohort",
            "summary.csv",
            "--summary-file",
            "summary.json",
        ])
        .expect("should parse");

        match cli.command {
            Commands::AggregateSummaries(args) => {
                assert_eq!(args.summary_file.as_deref(), Some("summary.json"));
            }
            _ => panic!("Expected AggregateSummaries command"),
        }
    }

    #[test]
    fn test_correct_command_defaults() {
        let cli = Cli::try_parse_from(["pi10-cohort", "correct-volumes", "cohort"])
            .expect("should parse");

        match cli.command {
            Commands::CorrectVolumes(args) => {
                assert_eq!(args.program, "python3");
                assert_eq!(args.script, PathBuf::from("./flag_potential_seg_errors.py"));
                assert!(!args.no_script);
                assert_eq!(args.timeout_secs, 600);
            }
            _ => panic!("Expected CorrectVolumes command"),
        }
    }

    #[test]
    fn test_correct_command_without_script() {
        let cli = Cli::try_parse_from([
            "pi10-cohort",
            "correct-volumes",
            "cohort",
            "--program",
            "./flag_errors",
            "--no-script",
        ])
        .expect("should parse");

        match cli.command {
            Commands::CorrectVolumes(args) => {
                assert_eq!(args.program, "./flag_errors");
                assert!(args.no_script);
            }
            _ => panic!("Expected CorrectVolumes command"),
        }

        let conflicting = Cli::try_parse_from([
            "pi10-cohort",
            "correct-volumes",
            "cohort",
            "--script",
            "check.py",
            "--no-script",
        ]);
        assert!(conflicting.is_err());
    }

    #[test]
    fn test_correct_command_rejects_zero_timeout() {
        let result = Cli::try_parse_from([
            "pi10-cohort",
            "correct-volumes",
            "cohort",
            "--timeout-secs",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_positional_rejected() {
        assert!(Cli::try_parse_from(["pi10-cohort", "compute-pi10", "cohort"]).is_err());
    }
}
