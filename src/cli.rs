//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Input paths and chunking fall back to the
//! config file, then to built-in defaults, when not given here.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// physio-agg - per-subject heart rate, temperature and sleep stage summaries
///
/// Reads every subject listed in the participant info file, streams the
/// subject's `{SID}_whole_df.csv` table in chunks and prints row counts,
/// mean heart rate and mean temperature per subject.
///
/// Examples:
///   physio-agg
///   physio-agg --data-dir ./data --roster ./participant_info.csv
///   physio-agg --chunk-size 250000 --output summary.md
///   physio-agg --output summary.json --format json --strict
///   physio-agg --dry-run
///   physio-agg --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Folder containing the per-subject `{SID}_whole_df.csv` files
    ///
    /// Default: ./data, or `data.data_dir` from the config file.
    #[arg(long, value_name = "DIR", env = "PHYSIO_AGG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Participant info CSV containing the SID column
    ///
    /// Default: ./participant_info.csv, or `data.roster` from the config file.
    #[arg(long, value_name = "FILE", env = "PHYSIO_AGG_ROSTER")]
    pub roster: Option<PathBuf>,

    /// Maximum number of rows read per chunk
    #[arg(long, value_name = "ROWS")]
    pub chunk_size: Option<usize>,

    /// Also write a report file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report file format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .physio-agg.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output, no progress bar)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 if any subject fails to analyze
    #[arg(long)]
    pub strict: bool,

    /// Dry run: load the roster and list subject files without aggregating
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .physio-agg.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.chunk_size == Some(0) {
            return Err("Chunk size must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            data_dir: None,
            roster: None,
            chunk_size: None,
            output: None,
            format: None,
            config: None,
            verbose: false,
            quiet: false,
            strict: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_defaults() {
        let args = Args::try_parse_from(["physio-agg"]).unwrap();
        assert!(args.chunk_size.is_none());
        assert!(args.output.is_none());
        assert!(!args.strict);
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "physio-agg",
            "--data-dir",
            "/tmp/data",
            "--chunk-size",
            "500",
            "-o",
            "out.json",
            "--format",
            "json",
            "--strict",
        ])
        .unwrap();

        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/data")));
        assert_eq!(args.chunk_size, Some(500));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert!(args.strict);
    }

    #[test]
    fn test_validation_zero_chunk_size() {
        let mut args = make_args();
        args.chunk_size = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
