//! Batch enrichment: planning, the fetch-and-merge runner, and snapshot persistence.
pub mod batch;
pub mod runner;
pub mod snapshot;

pub use batch::{plan_batches, Batch};
pub use runner::{EnrichmentRunner, RunSummary, RunnerConfig};
pub use snapshot::{CsvSnapshot, SnapshotSink};
