use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors produced by the playback statistics pipeline.
///
/// Only structural failures are represented here. A field that cannot be
/// coerced is not an error: it becomes `None` on the normalized record.
#[derive(Error, Debug)]
pub enum StatsError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The input is not an array of record-like objects.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The expected data file or directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No streaming-history files were found under the given directory.
    #[error("No streaming history files found in {0}")]
    NoDataFiles(PathBuf),

    /// A timezone name is not a recognised IANA identifier.
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The batch did not finish within the caller's deadline.
    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),

    /// Background work was stopped before it produced a result.
    #[error("Analysis aborted")]
    Aborted,

    /// A background computation task failed to complete.
    #[error("Analysis task failed: {0}")]
    Task(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the stats crates.
pub type Result<T> = std::result::Result<T, StatsError>;
