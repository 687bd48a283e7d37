use chrono_tz::Tz;
use stats_core::settings::Settings;
use stats_core::time_utils::resolve_timezone;
use stats_data::analysis::AnalysisOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` value to an [`EnvFilter`] directive.
///
/// Unrecognised names pass through lowercased so full filter expressions
/// such as `stats_data=debug` still work.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr so the report on stdout stays clean. Falls back to
/// `"info"` if the level string is not a valid filter.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(layer).init();

    Ok(())
}

// ── Options ────────────────────────────────────────────────────────────────────

/// Build the analysis options from parsed settings.
pub fn analysis_options(settings: &Settings) -> anyhow::Result<AnalysisOptions> {
    let timezone: Tz = resolve_timezone(&settings.timezone)?;
    Ok(AnalysisOptions {
        timezone,
        top_n: settings.top as usize,
        top_skip_artists: settings.top_skip_artists as usize,
        histogram_bins: settings.histogram_bins as usize,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive_maps_names() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("warn"), "warn");
        assert_eq!(level_directive("ERROR"), "error");
    }

    #[test]
    fn test_level_directive_passes_filters_through() {
        assert_eq!(level_directive("stats_data=DEBUG"), "stats_data=debug");
    }

    #[test]
    fn test_analysis_options_from_settings() {
        let settings = Settings::from_args([
            "playback-stats",
            "--timezone",
            "Europe/Madrid",
            "--top",
            "3",
            "--top-skip-artists",
            "2",
            "--histogram-bins",
            "20",
        ]);
        let options = analysis_options(&settings).unwrap();
        assert_eq!(options.timezone, Tz::Europe__Madrid);
        assert_eq!(options.top_n, 3);
        assert_eq!(options.top_skip_artists, 2);
        assert_eq!(options.histogram_bins, 20);
    }

    #[test]
    fn test_analysis_options_rejects_bad_timezone() {
        let settings = Settings::from_args(["playback-stats", "--timezone", "Mars/Olympus"]);
        assert!(analysis_options(&settings).is_err());
    }
}
