//! Ingestion orchestration for pricescrape.
//!
//! This crate ties together catalog normalization, item page fetching, sales
//! extraction, and the store into one end-to-end run ([`pipeline::ingest`]).

pub mod pipeline;
pub mod summary;

pub use pipeline::{ProgressReporter, SilentProgress, ingest};
pub use summary::{ConditionFailure, ItemFailure, RecordCounts, RunSummary};
