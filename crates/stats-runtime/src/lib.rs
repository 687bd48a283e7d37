//! Runtime layer for playback statistics.
//!
//! Runs the analysis tasks concurrently on tokio under an optional batch
//! timeout.

pub mod orchestrator;

pub use orchestrator::AnalysisOrchestrator;
pub use stats_core as core;
pub use stats_data as data;
