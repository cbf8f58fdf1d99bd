//! Data models for the aggregator.
//!
//! This module contains the core data structures shared by the chunk
//! source, the aggregator and the report generator.

use crate::error::AnalysisError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Heart-rate column name in subject tables.
pub const HR_COLUMN: &str = "HR";
/// Temperature column name in subject tables.
pub const TEMP_COLUMN: &str = "TEMP";
/// Sleep-stage column name in subject tables.
pub const STAGE_COLUMN: &str = "Sleep_Stage";
/// Identifier column name in the roster.
pub const ID_COLUMN: &str = "SID";

/// A bounded, row-ordered slice of one subject table.
///
/// Only the three analyzed columns are kept. Missing numeric cells are `None`;
/// a missing sleep stage is the empty label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub heart_rate: Vec<Option<f64>>,
    pub temperature: Vec<Option<f64>>,
    pub sleep_stage: Vec<String>,
}

impl Chunk {
    /// Creates an empty chunk with room for `rows` rows.
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            heart_rate: Vec::with_capacity(rows),
            temperature: Vec::with_capacity(rows),
            sleep_stage: Vec::with_capacity(rows),
        }
    }

    /// Appends one row.
    pub fn push(&mut self, heart_rate: Option<f64>, temperature: Option<f64>, stage: &str) {
        self.heart_rate.push(heart_rate);
        self.temperature.push(temperature);
        self.sleep_stage.push(stage.to_string());
    }

    /// Number of rows in the chunk.
    pub fn len(&self) -> usize {
        self.sleep_stage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sleep_stage.is_empty()
    }

    /// Mean heart rate over the chunk's non-missing values.
    pub fn mean_heart_rate(&self) -> f64 {
        column_mean(&self.heart_rate)
    }

    /// Mean temperature over the chunk's non-missing values.
    pub fn mean_temperature(&self) -> f64 {
        column_mean(&self.temperature)
    }

    /// Occurrence count of every distinct sleep-stage label in the chunk.
    pub fn stage_counts(&self) -> BTreeMap<&str, u64> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for stage in &self.sleep_stage {
            *counts.entry(stage.as_str()).or_default() += 1;
        }
        counts
    }
}

/// Mean of the present values, or NaN when there are none.
pub fn column_mean(values: &[Option<f64>]) -> f64 {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0_f64, 0_u64), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Final aggregate for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Subject identifier (SID).
    pub subject: String,
    /// Rows across all chunks.
    pub total_rows: u64,
    /// Number of chunks the table was read in.
    pub chunk_count: u64,
    /// Mean of the per-chunk heart-rate means.
    pub mean_hr: f64,
    /// Mean of the per-chunk temperature means.
    pub mean_temp: f64,
    /// Sleep-stage label to occurrence count.
    pub stage_counts: BTreeMap<String, u64>,
}

impl Summary {
    /// Sum of all sleep-stage counts. Always equals `total_rows`.
    pub fn stage_total(&self) -> u64 {
        self.stage_counts.values().sum()
    }
}

/// Result of analyzing one roster entry.
#[derive(Debug)]
pub struct SubjectOutcome {
    pub subject: String,
    pub result: Result<Summary, AnalysisError>,
}

impl SubjectOutcome {
    pub fn summary(&self) -> Option<&Summary> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        self.result.as_ref().err()
    }
}

/// A subject whose analysis failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectFailure {
    pub subject: String,
    /// Stable failure name (see `AnalysisError::kind`).
    pub kind: String,
    pub message: String,
}

impl SubjectFailure {
    pub fn from_error(subject: &str, error: &AnalysisError) -> Self {
        Self {
            subject: subject.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Metadata about a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Folder holding the per-subject tables.
    pub data_dir: PathBuf,
    /// Roster file the subject list came from.
    pub roster: PathBuf,
    /// Date and time of the run.
    pub analysis_date: DateTime<Utc>,
    /// Row cap per chunk.
    pub chunk_size: usize,
    /// Subjects in the roster.
    pub subjects_total: usize,
    /// Subjects that produced a summary.
    pub subjects_analyzed: usize,
    /// Subjects that failed.
    pub subjects_failed: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The complete batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Successful summaries, in roster order.
    pub summaries: Vec<Summary>,
    /// Failed subjects, in roster order.
    pub failures: Vec<SubjectFailure>,
}

impl Report {
    /// Splits batch outcomes into summaries and failures.
    pub fn from_outcomes(metadata: ReportMetadata, outcomes: &[SubjectOutcome]) -> Self {
        let mut summaries = Vec::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            match &outcome.result {
                Ok(summary) => summaries.push(summary.clone()),
                Err(e) => failures.push(SubjectFailure::from_error(&outcome.subject, e)),
            }
        }

        let mut metadata = metadata;
        metadata.subjects_total = outcomes.len();
        metadata.subjects_analyzed = summaries.len();
        metadata.subjects_failed = failures.len();

        Self {
            metadata,
            summaries,
            failures,
        }
    }
}
