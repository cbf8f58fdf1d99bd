//! Report rendering.
//!
//! Everything here is a pure function from summaries (and metadata) to
//! text: the terminal results table, per-subject error notices, and the
//! Markdown and JSON report files.

use crate::models::{Report, ReportMetadata, Summary, SubjectFailure, SubjectOutcome};
use anyhow::Result;

/// Column headings of the results table.
const TABLE_HEADINGS: [&str; 4] = ["User ID", "Total Rows", "Mean HR (bpm)", "Mean Temp (°C)"];

/// Label shown for sleep stages that were blank in the source table.
const MISSING_STAGE: &str = "(missing)";

/// Format a mean rounded to two decimals.
pub fn format_mean(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn table_row(summary: &Summary) -> [String; 4] {
    [
        summary.subject.clone(),
        summary.total_rows.to_string(),
        format_mean(summary.mean_hr),
        format_mean(summary.mean_temp),
    ]
}

/// Render the results table for successful subjects, in roster order.
///
/// Sleep-stage distributions are not part of the table.
pub fn render_table(outcomes: &[SubjectOutcome]) -> String {
    let rows: Vec<[String; 4]> = outcomes
        .iter()
        .filter_map(SubjectOutcome::summary)
        .map(table_row)
        .collect();

    let mut widths = TABLE_HEADINGS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let pad = |cells: &[&str]| -> String {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                let fill = " ".repeat(width - cell.chars().count());
                // ids left-aligned, numbers right-aligned
                if i == 0 {
                    format!("{}{}", cell, fill)
                } else {
                    format!("{}{}", fill, cell)
                }
            })
            .collect();
        line.join("  ").trim_end().to_string()
    };

    let mut table = String::new();
    table.push_str(&pad(&TABLE_HEADINGS));
    table.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    table.push_str(&rule.join("  "));
    table.push('\n');

    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        table.push_str(&pad(&cells));
        table.push('\n');
    }

    table
}

/// One notice line per failed subject.
pub fn render_notices(outcomes: &[SubjectOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter_map(|o| {
            o.error()
                .map(|e| format!("Error analyzing data for SID {}: {}", o.subject, e))
        })
        .collect()
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, include_stages: bool) -> String {
    let mut output = String::new();

    output.push_str("# physio-agg Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summaries));

    if include_stages {
        output.push_str(&generate_stage_section(&report.summaries));
    }

    output.push_str(&generate_failures_section(&report.failures));
    output.push_str("---\n\n*Report generated by physio-agg*\n");

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Data Folder:** `{}`\n",
        metadata.data_dir.display()
    ));
    section.push_str(&format!("- **Roster:** `{}`\n", metadata.roster.display()));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Chunk Size:** {} rows\n", metadata.chunk_size));
    section.push_str(&format!("- **Subjects:** {}\n", metadata.subjects_total));
    section.push_str(&format!(
        "- **Subjects Analyzed:** {}\n",
        metadata.subjects_analyzed
    ));
    if metadata.subjects_failed > 0 {
        section.push_str(&format!(
            "- **Subjects Failed:** {}\n",
            metadata.subjects_failed
        ));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary table section.
fn generate_summary_section(summaries: &[Summary]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    if summaries.is_empty() {
        section.push_str("No subjects were analyzed successfully.\n\n");
        return section;
    }

    section.push_str(&format!("| {} |\n", TABLE_HEADINGS.join(" | ")));
    section.push_str("|:---|---:|---:|---:|\n");

    for summary in summaries {
        section.push_str(&format!("| {} |\n", table_row(summary).join(" | ")));
    }
    section.push('\n');

    section
}

/// Generate the per-subject sleep-stage distribution section.
fn generate_stage_section(summaries: &[Summary]) -> String {
    if summaries.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Sleep Stage Distribution\n\n");

    for summary in summaries {
        section.push_str(&format!("### {}\n\n", summary.subject));
        section.push_str("| Stage | Count | Share |\n");
        section.push_str("|:---|---:|---:|\n");

        let mut stages: Vec<_> = summary.stage_counts.iter().collect();
        stages.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

        for (stage, count) in stages {
            let total = summary.stage_total();
            let share = if total > 0 {
                *count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let label = if stage.is_empty() {
                MISSING_STAGE
            } else {
                stage.as_str()
            };
            section.push_str(&format!("| {} | {} | {:.1}% |\n", label, count, share));
        }
        section.push('\n');
    }

    section
}

/// Generate the failures section.
fn generate_failures_section(failures: &[SubjectFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Failures\n\n");
    section.push_str("| User ID | Kind | Error |\n");
    section.push_str("|:---|:---|:---|\n");

    for failure in failures {
        section.push_str(&format!(
            "| {} | `{}` | {} |\n",
            failure.subject,
            failure.kind,
            failure.message.replace('|', "\\|")
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
