//! Data layer for playback statistics.
//!
//! Responsible for discovering and reading streaming-history files,
//! validating and normalizing their records, grouping them into aggregate
//! views and running the sequential analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod ingest;
pub mod normalizer;
pub mod reader;

pub use stats_core as core;

/// Number of items processed between two checks of an abort flag.
pub const ABORT_CHECK_INTERVAL: usize = 4096;
