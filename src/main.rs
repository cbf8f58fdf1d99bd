//! physio-agg - per-subject physiological summaries from large CSV files
//!
//! Reads the participant roster, streams each subject's table in
//! fixed-size chunks and prints row counts, mean heart rate and mean
//! temperature per subject. Sleep-stage distributions go to the report file.
//!
//! Exit codes:
//!   0 - Success (failed subjects are reported but do not fail the run)
//!   1 - Fatal error (invalid paths, roster, config, report write)
//!   2 - At least one subject failed and --strict was set

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod roster;
mod source;

use analysis::{run_batch, Aggregator, BatchEvent};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, ReportMetadata, SubjectOutcome};
use source::{ChunkSource, CsvChunkSource};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .physio-agg.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the data folder, roster file and chunk size.");
    Ok(())
}

/// Initialize logging at the given level. Logs go to stderr so stdout
/// only carries the results table.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the whole batch. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let (mut config, config_path) = load_config(&args)?;
    config.merge_with_args(&args);

    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };
    init_logging(level);

    info!("physio-agg v{}", env!("CARGO_PKG_VERSION"));
    match config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Arguments: {:?}", args);

    // Step 1: Startup checks; any failure here is fatal
    config.validate()?;
    let roster = roster::load_roster(&config.data.roster)?;
    info!(
        "Loaded {} subjects from {}",
        roster.len(),
        config.data.roster.display()
    );

    let source = CsvChunkSource::new(&config.data.data_dir);

    // Handle --dry-run: list subject files and exit
    if args.dry_run {
        return Ok(handle_dry_run(&source, &roster));
    }

    // Step 2: Analyze every subject
    if !args.quiet {
        println!(
            "🔬 Analyzing {} subjects from {} (chunk size {})...\n",
            roster.len(),
            config.data.data_dir.display(),
            config.data.chunk_size
        );
    }

    let aggregator = Aggregator::new(source, config.data.chunk_size);
    let outcomes = analyze_with_progress(&aggregator, &roster, !args.quiet);

    // Step 3: Present the results
    println!("{}", report::render_table(&outcomes));

    for notice in report::render_notices(&outcomes) {
        eprintln!("⚠️  {}", notice);
    }

    let metadata = ReportMetadata {
        data_dir: config.data.data_dir.clone(),
        roster: config.data.roster.clone(),
        analysis_date: Utc::now(),
        chunk_size: aggregator.chunk_size(),
        subjects_total: 0,
        subjects_analyzed: 0,
        subjects_failed: 0,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };
    let report = Report::from_outcomes(metadata, &outcomes);

    // Step 4: Write the report file, if requested
    if let Some(ref path) = config.report.output {
        let output = match config.report.format {
            OutputFormat::Json => report::generate_json_report(&report)?,
            OutputFormat::Markdown => {
                report::generate_markdown_report(&report, config.report.include_stage_distribution)
            }
        };

        std::fs::write(path, &output)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }

    let failed = report.metadata.subjects_failed;
    if !args.quiet {
        println!(
            "\n✅ All Done! {} of {} subjects analyzed ({} failed) in {:.1}s",
            report.metadata.subjects_analyzed,
            report.metadata.subjects_total,
            failed,
            report.metadata.duration_seconds
        );
        if let Some(ref path) = config.report.output {
            println!("   Report saved to: {}", path.display());
        }
    }

    // Check --strict
    if args.strict && failed > 0 {
        eprintln!(
            "\n⛔ {} subject(s) failed. Failing (exit code 2).",
            failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Run the batch, driving a progress bar from batch events.
fn analyze_with_progress<S: ChunkSource>(
    aggregator: &Aggregator<S>,
    roster: &[String],
    show_progress: bool,
) -> Vec<SubjectOutcome> {
    let progress_bar = if show_progress {
        let pb = ProgressBar::new(roster.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let outcomes = run_batch(aggregator, roster, |event| {
        let Some(ref pb) = progress_bar else {
            return;
        };
        match event {
            BatchEvent::Started { subject, .. } => {
                pb.set_message(format!("Analyzing User {}...", subject));
            }
            BatchEvent::Finished {
                index,
                total,
                subject,
                ok,
            } => {
                pb.set_position(index as u64 + 1);
                if !ok {
                    pb.set_message(format!("User {} failed ({}/{})", subject, index + 1, total));
                }
            }
        }
    });

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Analysis complete");
    }

    outcomes
}

/// Handle --dry-run: show which roster subjects have a table file.
fn handle_dry_run(source: &CsvChunkSource, roster: &[String]) -> i32 {
    println!("\n🔍 Dry run: checking subject files (no aggregation)...\n");

    let listed = source.availability(roster);
    let missing = listed.iter().filter(|(_, size)| size.is_none()).count();

    if listed.is_empty() {
        println!("   The roster lists no subjects.");
    } else {
        for (subject, size) in &listed {
            let path = source.table_path(subject);
            match size {
                Some(bytes) => println!("     📄 {} ({} bytes)", path.display(), bytes),
                None => println!("     ❌ {} (missing)", path.display()),
            }
        }
        println!(
            "\n   Total: {} subjects, {} with data, {} missing",
            listed.len(),
            listed.len() - missing,
            missing
        );
    }

    println!("\n✅ Dry run complete. No tables were aggregated.");
    0
}

/// Load configuration from the explicit path, the default file, or defaults.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(CONFIG_FILE)))),
        None => Ok((Config::default(), None)),
    }
}
