//! Analysis modules.
//!
//! The aggregator folds one subject's chunks into a summary; the batch
//! runner drives it across the roster.

pub mod aggregator;
pub mod batch;

pub use aggregator::{Aggregator, DEFAULT_CHUNK_SIZE};
pub use batch::{run_batch, BatchEvent};
