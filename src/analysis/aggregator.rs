//! Streaming per-subject aggregation.
//!
//! Chunks are folded one at a time into an [`Accumulator`], so memory use
//! is bounded by the chunk size no matter how long a subject's table is.
//!
//! Means are averaged per chunk: the subject mean is the arithmetic mean of
//! the chunk means, not a row-weighted mean. A short final chunk therefore
//! carries as much weight as a full one.

use crate::error::AnalysisError;
use crate::models::{Chunk, Summary};
use crate::source::ChunkSource;
use std::collections::BTreeMap;
use tracing::debug;

/// Default row cap per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

/// Running state for one subject.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    total_rows: u64,
    sum_hr: f64,
    sum_temp: f64,
    chunk_count: u64,
    stage_counts: BTreeMap<String, u64>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk into the running totals.
    pub fn add_chunk(&mut self, chunk: &Chunk) {
        self.total_rows += chunk.len() as u64;
        self.sum_hr += chunk.mean_heart_rate();
        self.sum_temp += chunk.mean_temperature();

        for (stage, count) in chunk.stage_counts() {
            *self.stage_counts.entry(stage.to_string()).or_default() += count;
        }

        self.chunk_count += 1;
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Turn the totals into a summary. Fails when no chunk was seen.
    pub fn finish(self, subject: &str) -> Result<Summary, AnalysisError> {
        if self.chunk_count == 0 {
            return Err(AnalysisError::DivisionUndefined {
                subject: subject.to_string(),
            });
        }

        let chunks = self.chunk_count as f64;
        Ok(Summary {
            subject: subject.to_string(),
            total_rows: self.total_rows,
            chunk_count: self.chunk_count,
            mean_hr: self.sum_hr / chunks,
            mean_temp: self.sum_temp / chunks,
            stage_counts: self.stage_counts,
        })
    }
}

/// Computes summaries by pulling chunks from a [`ChunkSource`].
pub struct Aggregator<S> {
    source: S,
    chunk_size: usize,
}

impl<S: ChunkSource> Aggregator<S> {
    /// Create a new aggregator. A zero chunk size is treated as one row.
    pub fn new(source: S, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Analyze one subject's full table.
    pub fn analyze(&self, subject: &str) -> Result<Summary, AnalysisError> {
        let mut acc = Accumulator::new();

        for chunk in self.source.chunks(subject, self.chunk_size)? {
            let chunk = chunk?;
            acc.add_chunk(&chunk);
            debug!(
                "{}: chunk {} ({} rows, {} total)",
                subject,
                acc.chunk_count(),
                chunk.len(),
                acc.total_rows()
            );
        }

        acc.finish(subject)
    }
}
