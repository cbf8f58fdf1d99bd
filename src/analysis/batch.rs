//! Roster-wide batch runs.
//!
//! Subjects are analyzed one after another in roster order. A failing
//! subject is recorded and the batch moves on to the next one.

use crate::analysis::aggregator::Aggregator;
use crate::models::SubjectOutcome;
use crate::source::ChunkSource;
use tracing::{info, warn};

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent<'a> {
    /// Analysis of a subject is about to start.
    Started {
        index: usize,
        total: usize,
        subject: &'a str,
    },
    /// Analysis of a subject ended, successfully or not.
    Finished {
        index: usize,
        total: usize,
        subject: &'a str,
        ok: bool,
    },
}

/// Analyze every subject in `roster`, one outcome per entry.
pub fn run_batch<S, F>(
    aggregator: &Aggregator<S>,
    roster: &[String],
    mut observe: F,
) -> Vec<SubjectOutcome>
where
    S: ChunkSource,
    F: FnMut(BatchEvent<'_>),
{
    let total = roster.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, subject) in roster.iter().enumerate() {
        observe(BatchEvent::Started {
            index,
            total,
            subject,
        });

        let result = aggregator.analyze(subject);
        match &result {
            Ok(summary) => info!(
                "Analyzed {}: {} rows in {} chunk(s)",
                subject, summary.total_rows, summary.chunk_count
            ),
            Err(e) => warn!("Error analyzing data for SID {}: {}", subject, e),
        }

        observe(BatchEvent::Finished {
            index,
            total,
            subject,
            ok: result.is_ok(),
        });

        outcomes.push(SubjectOutcome {
            subject: subject.clone(),
            result,
        });
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::tests::MemorySource;
    use crate::source::CsvChunkSource;
    use std::fs;
    use tempfile::TempDir;

    fn roster(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let source = MemorySource::default()
            .with("A", vec![(60.0, 36.0, "Wake")])
            .with("C", vec![(70.0, 37.0, "N3")]);
        let aggregator = Aggregator::new(source, 10);

        let outcomes = run_batch(&aggregator, &roster(&["A", "B", "C"]), |_| {});

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].summary().is_some());
        assert_eq!(outcomes[1].subject, "B");
        assert_eq!(outcomes[1].error().map(|e| e.kind()), Some("not_found"));
        assert!(outcomes[2].summary().is_some());
    }

    #[test]
    fn test_batch_events_in_order() {
        let source = MemorySource::default().with("A", vec![(60.0, 36.0, "Wake")]);
        let aggregator = Aggregator::new(source, 10);

        let mut events = Vec::new();
        run_batch(&aggregator, &roster(&["A", "B"]), |event| {
            events.push(match event {
                BatchEvent::Started { index, .. } => format!("start {}", index),
                BatchEvent::Finished { index, ok, total, .. } => {
                    format!("end {}/{} {}", index, total, ok)
                }
            })
        });

        assert_eq!(
            events,
            vec!["start 0", "end 0/2 true", "start 1", "end 1/2 false"]
        );
    }

    #[test]
    fn test_empty_roster() {
        let aggregator = Aggregator::new(MemorySource::default(), 10);
        assert!(run_batch(&aggregator, &[], |_| {}).is_empty());
    }

    #[test]
    fn test_end_to_end_with_csv_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("A_whole_df.csv"),
            "HR,TEMP,Sleep_Stage\n60,36,Wake\n62,36.2,Wake\n64,36.4,REM\n",
        )
        .unwrap();

        let aggregator = Aggregator::new(CsvChunkSource::new(dir.path()), 1_000_000);
        let outcomes = run_batch(&aggregator, &roster(&["A", "B"]), |_| {});

        let summaries: Vec<_> = outcomes.iter().filter_map(|o| o.summary()).collect();
        assert_eq!(summaries.len(), 1);

        let a = summaries[0];
        assert_eq!(a.subject, "A");
        assert_eq!(a.total_rows, 3);
        assert!((a.mean_hr - 62.0).abs() < 1e-9);
        assert!((a.mean_temp - 36.2).abs() < 1e-9);
        assert_eq!(a.stage_counts.len(), 2);
        assert_eq!(a.stage_counts["Wake"], 2);
        assert_eq!(a.stage_counts["REM"], 1);

        assert_eq!(outcomes[1].subject, "B");
        assert_eq!(outcomes[1].error().map(|e| e.kind()), Some("not_found"));
    }

    #[test]
    fn test_fixture_cohort() {
        let fixtures = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let roster = crate::roster::load_roster(&fixtures.join("participant_info.csv")).unwrap();
        assert_eq!(roster, vec!["S01", "S02", "S03", "S04"]);

        let aggregator = Aggregator::new(CsvChunkSource::new(fixtures.join("data")), 4);
        let outcomes = run_batch(&aggregator, &roster, |_| {});

        let s01 = outcomes[0].summary().unwrap();
        assert_eq!(s01.total_rows, 6);
        assert_eq!(s01.chunk_count, 2);
        // chunk means 65 and 59; the row-weighted mean would be 63
        assert!((s01.mean_hr - 62.0).abs() < 1e-9);
        assert!((s01.mean_temp - 33.525).abs() < 1e-9);
        assert_eq!(s01.stage_total(), 6);
        assert_eq!(s01.stage_counts["N2"], 2);

        let kinds: Vec<_> = outcomes[1..]
            .iter()
            .map(|o| o.error().map(|e| e.kind()))
            .collect();
        assert_eq!(
            kinds,
            vec![Some("not_found"), Some("division_undefined"), Some("schema")]
        );
    }

    #[test]
    fn test_header_only_file_is_division_undefined() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("E_whole_df.csv"), "HR,TEMP,Sleep_Stage\n").unwrap();

        let aggregator = Aggregator::new(CsvChunkSource::new(dir.path()), 100);
        let outcomes = run_batch(&aggregator, &roster(&["E"]), |_| {});

        assert_eq!(
            outcomes[0].error().map(|e| e.kind()),
            Some("division_undefined")
        );
    }
}
