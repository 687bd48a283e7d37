use clap::Parser;
use std::path::PathBuf;

use crate::error::{Result, StatsError};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Listening statistics from a streaming-history export
#[derive(Parser, Debug, Clone)]
#[command(
    name = "playback-stats",
    about = "Listening statistics from a streaming-history export",
    version
)]
pub struct Settings {
    /// History file, or directory containing Streaming_History_Audio_*.json files
    #[arg(long, env = "PLAYBACK_STATS_DATA", default_value = "./spotifydata")]
    pub data_path: PathBuf,

    /// Timezone for month, hour and weekday buckets ("auto" uses the system zone)
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Number of rows shown in the top-N tables
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    pub top: u32,

    /// Number of artists in the skip-ratio ranking
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..))]
    pub top_skip_artists: u32,

    /// Number of bins in the play-duration histogram
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub histogram_bins: u32,

    /// Write the full report (normalized records included) as JSON to this file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Abort the analysis if it takes longer than this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Compute all views on the current thread instead of in parallel tasks
    #[arg(long)]
    pub sequential: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "debug", "info", "warning", "warn", "error"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse the process arguments and apply derived overrides.
    pub fn load() -> Self {
        Self::from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Reject combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == Some(0) {
            return Err(StatsError::Config(
                "--timeout-secs must be greater than zero".to_string(),
            ));
        }
        if !self.timezone.eq_ignore_ascii_case("auto")
            && !crate::time_utils::validate_timezone(&self.timezone)
        {
            return Err(StatsError::InvalidTimezone(self.timezone.clone()));
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
