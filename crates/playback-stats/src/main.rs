mod bootstrap;
mod export;
mod report;

use std::time::Duration;

use anyhow::{Context, Result};
use stats_core::settings::Settings;
use stats_data::analysis::{analyze_events, AnalysisReport};
use stats_data::reader::load_history;
use stats_runtime::AnalysisOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;
    settings.validate()?;

    tracing::info!("playback-stats v{} starting", env!("CARGO_PKG_VERSION"));

    let report = run(&settings).await?;

    print!("{}", report::render_report(&report, settings.top as usize));

    if let Some(path) = &settings.export {
        export::export_report(&report, path)
            .with_context(|| format!("exporting report to {}", path.display()))?;
    }

    Ok(())
}

/// Load the history and build the report, concurrently unless `--sequential`.
async fn run(settings: &Settings) -> Result<AnalysisReport> {
    let options = bootstrap::analysis_options(settings)?;

    let data_path = settings.data_path.clone();
    let raw = tokio::task::spawn_blocking(move || load_history(&data_path))
        .await
        .context("loading history")?
        .with_context(|| format!("reading {}", settings.data_path.display()))?;

    tracing::info!(
        "Loaded {} raw events from {}",
        raw.len(),
        settings.data_path.display()
    );

    let report = if settings.sequential {
        analyze_events(&raw, &options)?
    } else {
        let timeout = settings.timeout_secs.map(Duration::from_secs);
        AnalysisOrchestrator::new(options, timeout).run(raw).await?
    };

    Ok(report)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_history(dir: &std::path::Path) {
        let history = json!([
            {
                "ts": "2024-03-01T12:00:00Z",
                "ms_played": 1500,
                "master_metadata_track_name": "A",
                "master_metadata_album_artist_name": "X",
                "skipped": true
            },
            {
                "ts": "2024-03-02T12:00:00Z",
                "ms_played": 2500,
                "master_metadata_track_name": "A",
                "master_metadata_album_artist_name": "X"
            }
        ]);
        std::fs::write(
            dir.join("Streaming_History_Audio_2024.json"),
            history.to_string(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_run_concurrent_and_sequential_agree() {
        let dir = TempDir::new().unwrap();
        write_history(dir.path());
        let data_path = dir.path().to_string_lossy().into_owned();

        let concurrent = run(&Settings::from_args([
            "playback-stats",
            "--data-path",
            data_path.as_str(),
        ]))
        .await
        .unwrap();
        let sequential = run(&Settings::from_args([
            "playback-stats",
            "--data-path",
            data_path.as_str(),
            "--sequential",
        ]))
        .await
        .unwrap();

        assert_eq!(concurrent.records.len(), 2);
        assert_eq!(
            serde_json::to_string(&concurrent.views).unwrap(),
            serde_json::to_string(&sequential.views).unwrap()
        );
        // 1500 ms and 2500 ms both round to 2 s.
        let track = &concurrent.views[0].entries[0];
        assert_eq!(track.total_duration_seconds, 4);
        assert_eq!(track.skip_ratio, Some(0.5));
    }

    #[tokio::test]
    async fn test_run_missing_data_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing").to_string_lossy().into_owned();
        let result = run(&Settings::from_args([
            "playback-stats",
            "--data-path",
            missing.as_str(),
        ]))
        .await;
        assert!(result.is_err());
    }
}
