//! Analysis pipeline for playback history.
//!
//! Splits the work into independent [`AnalysisTask`]s over one immutable
//! record slice and assembles their outputs into an [`AnalysisReport`]. The
//! sequential entry points here run the tasks one after another; the runtime
//! crate runs the same tasks concurrently.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use stats_core::calculations::{
    null_counts, playback_modes, CorrelationCalculator, DurationStatistics, SkipMetrics,
};
use stats_core::error::{Result, StatsError};
use stats_core::models::{
    AggregateEntry, AggregateView, CorrelationMatrix, Dimension, DurationHistogram,
    DurationSummary, NormalizedPlayEvent, NullCounts, PlaybackModes, RawPlayEvent,
    SkipProportion,
};
use tracing::{debug, info};

use crate::aggregator::PlayAggregator;
use crate::normalizer::{CoercionReport, Normalizer};
use crate::reader::load_history;

// ── Options ───────────────────────────────────────────────────────────────────

/// Tunables shared by every task of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisOptions {
    /// Zone used for month, hour and weekday buckets.
    pub timezone: Tz,
    /// Length of the most-skipped track list.
    pub top_n: usize,
    /// Length of the artist skip-ratio ranking.
    pub top_skip_artists: usize,
    /// Number of duration histogram bins.
    pub histogram_bins: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            top_n: 10,
            top_skip_artists: 5,
            histogram_bins: 50,
        }
    }
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

/// One independent unit of analysis work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisTask {
    View(Dimension),
    SkipProportion,
    Correlation,
    PlaybackModes,
    DurationSummary,
    DurationHistogram,
    NullCounts,
}

/// Result of running one [`AnalysisTask`].
#[derive(Debug, Clone)]
pub enum TaskOutput {
    View(AggregateView),
    SkipProportion(SkipProportion),
    Correlation(CorrelationMatrix),
    PlaybackModes(PlaybackModes),
    DurationSummary(DurationSummary),
    DurationHistogram(DurationHistogram),
    NullCounts(NullCounts),
}

impl AnalysisTask {
    /// Every task needed for a complete report.
    pub fn all() -> Vec<AnalysisTask> {
        let mut tasks: Vec<AnalysisTask> = Dimension::ALL.iter().map(|d| Self::View(*d)).collect();
        tasks.extend([
            Self::SkipProportion,
            Self::Correlation,
            Self::PlaybackModes,
            Self::DurationSummary,
            Self::DurationHistogram,
            Self::NullCounts,
        ]);
        tasks
    }

    pub fn name(&self) -> String {
        match self {
            Self::View(d) => format!("view:{}", d.name()),
            Self::SkipProportion => "skip_proportion".to_string(),
            Self::Correlation => "correlation".to_string(),
            Self::PlaybackModes => "playback_modes".to_string(),
            Self::DurationSummary => "duration_summary".to_string(),
            Self::DurationHistogram => "duration_histogram".to_string(),
            Self::NullCounts => "null_counts".to_string(),
        }
    }

    /// Compute this task over `records`. Pure; never touches shared state.
    pub fn run(&self, records: &[NormalizedPlayEvent], options: &AnalysisOptions) -> TaskOutput {
        match self {
            Self::View(d) => {
                TaskOutput::View(PlayAggregator::new(options.timezone).aggregate_by(records, *d))
            }
            Self::SkipProportion => TaskOutput::SkipProportion(SkipMetrics::proportion(records)),
            Self::Correlation => {
                TaskOutput::Correlation(CorrelationCalculator::matrix(records, options.timezone))
            }
            Self::PlaybackModes => TaskOutput::PlaybackModes(playback_modes(records)),
            Self::DurationSummary => {
                TaskOutput::DurationSummary(DurationStatistics::summary(records))
            }
            Self::DurationHistogram => TaskOutput::DurationHistogram(DurationStatistics::histogram(
                records,
                options.histogram_bins,
            )),
            Self::NullCounts => TaskOutput::NullCounts(null_counts(records)),
        }
    }

    /// Like [`AnalysisTask::run`], but returns `None` once `abort` is set.
    ///
    /// Views poll the flag while grouping; the other tasks only check it
    /// before starting.
    pub fn run_abortable(
        &self,
        records: &[NormalizedPlayEvent],
        options: &AnalysisOptions,
        abort: &AtomicBool,
    ) -> Option<TaskOutput> {
        if abort.load(Ordering::Acquire) {
            return None;
        }
        match self {
            Self::View(d) => PlayAggregator::new(options.timezone)
                .aggregate_by_abortable(records, *d, abort)
                .map(TaskOutput::View),
            _ => Some(self.run(records, options)),
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Metadata produced alongside the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp of when the report was generated.
    pub generated_at: String,
    /// Number of raw events handed to the normalizer.
    pub raw_records: usize,
    /// Number of normalized records (always equal to `raw_records`).
    pub records: usize,
    /// IANA name of the bucketing timezone.
    pub timezone: String,
    /// Values dropped to null during normalization.
    pub coercion: CoercionReport,
}

impl AnalysisMetadata {
    pub fn new(raw_records: usize, records: usize, coercion: CoercionReport, tz: Tz) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            raw_records,
            records,
            timezone: tz.name().to_string(),
            coercion,
        }
    }
}

/// Everything the exporter needs: the records, all views and all metrics.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    pub records: Vec<NormalizedPlayEvent>,
    /// One view per dimension, in [`Dimension::ALL`] order.
    pub views: Vec<AggregateView>,
    pub skip_proportion: SkipProportion,
    pub artist_skip_ratios: Vec<AggregateEntry>,
    pub most_skipped_tracks: Vec<AggregateEntry>,
    pub correlation: CorrelationMatrix,
    pub playback_modes: PlaybackModes,
    pub duration_summary: DurationSummary,
    pub duration_histogram: DurationHistogram,
    pub null_counts: NullCounts,
}

impl AnalysisReport {
    pub fn view(&self, dimension: Dimension) -> Option<&AggregateView> {
        self.views.iter().find(|v| v.dimension == dimension)
    }

    /// `true` when the report was built from zero records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Collects task outputs in any order and assembles the final report.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    views: BTreeMap<Dimension, AggregateView>,
    skip_proportion: Option<SkipProportion>,
    correlation: Option<CorrelationMatrix>,
    playback_modes: Option<PlaybackModes>,
    duration_summary: Option<DurationSummary>,
    duration_histogram: Option<DurationHistogram>,
    null_counts: Option<NullCounts>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, output: TaskOutput) {
        match output {
            TaskOutput::View(view) => {
                self.views.insert(view.dimension, view);
            }
            TaskOutput::SkipProportion(p) => self.skip_proportion = Some(p),
            TaskOutput::Correlation(m) => self.correlation = Some(m),
            TaskOutput::PlaybackModes(m) => self.playback_modes = Some(m),
            TaskOutput::DurationSummary(s) => self.duration_summary = Some(s),
            TaskOutput::DurationHistogram(h) => self.duration_histogram = Some(h),
            TaskOutput::NullCounts(c) => self.null_counts = Some(c),
        }
    }

    /// Assemble the report. Fails if any task output is missing, so a report
    /// is either complete or not produced at all.
    pub fn finish(
        mut self,
        records: Vec<NormalizedPlayEvent>,
        metadata: AnalysisMetadata,
        options: &AnalysisOptions,
    ) -> Result<AnalysisReport> {
        let mut views = Vec::with_capacity(Dimension::ALL.len());
        for dimension in Dimension::ALL {
            let view = self
                .views
                .remove(&dimension)
                .ok_or_else(|| missing(&format!("view:{}", dimension.name())))?;
            views.push(view);
        }

        let artist_skip_ratios = views
            .iter()
            .find(|v| v.dimension == Dimension::Artist)
            .map(|v| SkipMetrics::skip_ratio_ranking(v, options.top_skip_artists))
            .unwrap_or_default();
        let most_skipped_tracks = views
            .iter()
            .find(|v| v.dimension == Dimension::Track)
            .map(|v| SkipMetrics::most_skipped(v, options.top_n))
            .unwrap_or_default();

        Ok(AnalysisReport {
            metadata,
            records,
            views,
            skip_proportion: self.skip_proportion.ok_or_else(|| missing("skip_proportion"))?,
            artist_skip_ratios,
            most_skipped_tracks,
            correlation: self.correlation.ok_or_else(|| missing("correlation"))?,
            playback_modes: self.playback_modes.ok_or_else(|| missing("playback_modes"))?,
            duration_summary: self.duration_summary.ok_or_else(|| missing("duration_summary"))?,
            duration_histogram: self
                .duration_histogram
                .ok_or_else(|| missing("duration_histogram"))?,
            null_counts: self.null_counts.ok_or_else(|| missing("null_counts"))?,
        })
    }
}

fn missing(task: &str) -> StatsError {
    StatsError::Task(format!("no output for task {task}"))
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Run every task sequentially over already-normalized records.
pub fn analyze_records(
    records: Vec<NormalizedPlayEvent>,
    metadata: AnalysisMetadata,
    options: &AnalysisOptions,
) -> Result<AnalysisReport> {
    let mut builder = ReportBuilder::new();
    for task in AnalysisTask::all() {
        debug!("running {}", task.name());
        builder.add(task.run(&records, options));
    }
    builder.finish(records, metadata, options)
}

/// Normalize raw events and analyze them sequentially.
pub fn analyze_events(raw: &[RawPlayEvent], options: &AnalysisOptions) -> Result<AnalysisReport> {
    let start = std::time::Instant::now();
    let (records, coercion) = Normalizer::normalize_with_report(raw);
    let metadata = AnalysisMetadata::new(raw.len(), records.len(), coercion, options.timezone);
    let report = analyze_records(records, metadata, options)?;
    info!(
        "Analyzed {} records in {:.3}s",
        report.records.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(report)
}

/// Load history from `path` and analyze it sequentially.
pub fn analyze_path(path: &Path, options: &AnalysisOptions) -> Result<AnalysisReport> {
    let raw = load_history(path)?;
    analyze_events(&raw, options)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stats_core::models::{GroupKey, NumericField};
    use tempfile::TempDir;

    fn raw_events() -> Vec<RawPlayEvent> {
        let document = json!([
            {
                "ts": "2024-01-15T08:00:00Z",
                "platform": "android",
                "ms_played": 1000,
                "conn_country": "ES",
                "master_metadata_track_name": "A",
                "master_metadata_album_artist_name": "X",
                "master_metadata_album_album_name": "LP",
                "reason_start": "clickrow",
                "reason_end": "trackdone",
                "shuffle": true,
                "skipped": false
            },
            {
                "ts": "2024-01-15T09:00:00Z",
                "platform": "android",
                "ms_played": 2000,
                "master_metadata_track_name": "A",
                "master_metadata_album_artist_name": "X",
                "skipped": true
            },
            {
                "ts": "2024-02-01T20:00:00Z",
                "platform": "ios",
                "ms_played": 3000,
                "master_metadata_track_name": "A",
                "master_metadata_album_artist_name": "X",
                "skipped": false
            },
            {
                "ts": "not a date",
                "ms_played": 240000,
                "master_metadata_track_name": "B",
                "master_metadata_album_artist_name": "Y",
                "skipped": true,
                "offline": true
            }
        ]);
        crate::ingest::ingest(document).unwrap()
    }

    #[test]
    fn test_analyze_events_full_report() {
        let report = analyze_events(&raw_events(), &AnalysisOptions::default()).unwrap();

        assert_eq!(report.records.len(), 4);
        assert_eq!(report.metadata.raw_records, 4);
        assert_eq!(report.metadata.coercion.unparseable_timestamps, 1);
        assert_eq!(report.metadata.timezone, "UTC");
        assert_eq!(report.views.len(), Dimension::ALL.len());

        let track = report.view(Dimension::Track).unwrap();
        let a = &track.entries[0];
        assert_eq!(a.label, "A / X");
        assert_eq!((a.plays, a.skips, a.total_duration_seconds), (3, 1, 6));

        let months = report.view(Dimension::MonthYear).unwrap();
        assert_eq!(months.total_plays(), 3);
        assert_eq!(months.unparseable_timestamps, 1);

        assert_eq!(report.skip_proportion.skipped, 2);
        assert_eq!(report.skip_proportion.proportion, Some(0.5));
        assert_eq!(report.playback_modes.shuffle, 1);
        assert_eq!(report.playback_modes.offline, 1);
        assert_eq!(report.duration_summary.count, 4);
        assert_eq!(report.duration_histogram.total(), 4);
        assert_eq!(report.null_counts.timestamp, 1);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_skip_rankings_are_derived() {
        let report = analyze_events(&raw_events(), &AnalysisOptions::default()).unwrap();

        // Y: 1/1 skipped, X: 1/3.
        let labels: Vec<&str> = report
            .artist_skip_ratios
            .iter()
            .map(|e| e.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Y", "X"]);

        assert_eq!(report.most_skipped_tracks.len(), 2);
        assert!(report.most_skipped_tracks.iter().all(|e| e.skips > 0));
    }

    #[test]
    fn test_top_skip_artists_limits_ranking() {
        let options = AnalysisOptions {
            top_skip_artists: 1,
            ..AnalysisOptions::default()
        };
        let report = analyze_events(&raw_events(), &options).unwrap();
        assert_eq!(report.artist_skip_ratios.len(), 1);
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let report = analyze_events(&[], &AnalysisOptions::default()).unwrap();

        assert!(report.is_empty());
        assert!(report.views.iter().all(|v| v.is_empty()));
        assert_eq!(report.skip_proportion.proportion, None);
        assert_eq!(
            report
                .correlation
                .get(NumericField::DurationSeconds, NumericField::DurationSeconds),
            None
        );
        assert_eq!(report.duration_summary.mean, None);
        assert!(report.duration_histogram.bins.is_empty());
        assert!(report.artist_skip_ratios.is_empty());
    }

    #[test]
    fn test_views_are_deterministic() {
        let raw = raw_events();
        let options = AnalysisOptions::default();
        let first = analyze_events(&raw, &options).unwrap();
        let second = analyze_events(&raw, &options).unwrap();
        assert_eq!(
            serde_json::to_string(&first.views).unwrap(),
            serde_json::to_string(&second.views).unwrap()
        );
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn test_task_outputs_in_any_order() {
        let records = Normalizer::normalize(&raw_events());
        let options = AnalysisOptions::default();

        let mut builder = ReportBuilder::new();
        for task in AnalysisTask::all().into_iter().rev() {
            builder.add(task.run(&records, &options));
        }
        let metadata = AnalysisMetadata::new(4, 4, CoercionReport::default(), Tz::UTC);
        let report = builder.finish(records, metadata, &options).unwrap();

        let dims: Vec<Dimension> = report.views.iter().map(|v| v.dimension).collect();
        assert_eq!(dims, Dimension::ALL.to_vec());
    }

    #[test]
    fn test_run_abortable() {
        let records = Normalizer::normalize(&raw_events());
        let options = AnalysisOptions::default();

        let running = AtomicBool::new(false);
        for task in AnalysisTask::all() {
            let output = task.run_abortable(&records, &options, &running).unwrap();
            assert_eq!(
                format!("{output:?}"),
                format!("{:?}", task.run(&records, &options))
            );
        }

        let aborted = AtomicBool::new(true);
        assert!(AnalysisTask::all()
            .iter()
            .all(|task| task.run_abortable(&records, &options, &aborted).is_none()));
    }

    #[test]
    fn test_incomplete_builder_fails() {
        let records = Normalizer::normalize(&raw_events());
        let options = AnalysisOptions::default();

        let mut builder = ReportBuilder::new();
        builder.add(AnalysisTask::SkipProportion.run(&records, &options));
        let metadata = AnalysisMetadata::new(4, 4, CoercionReport::default(), Tz::UTC);
        assert!(matches!(
            builder.finish(records, metadata, &options),
            Err(StatsError::Task(_))
        ));
    }

    #[test]
    fn test_timezone_moves_hour_buckets() {
        let options = AnalysisOptions {
            timezone: "America/New_York".parse().unwrap(),
            ..AnalysisOptions::default()
        };
        let report = analyze_events(&raw_events(), &options).unwrap();
        let hours = report.view(Dimension::HourOfDay).unwrap();
        // 08:00Z and 09:00Z are 03:00 and 04:00 in New York (EST).
        assert!(hours.get(&GroupKey::Hour(3)).is_some());
        assert!(hours.get(&GroupKey::Hour(8)).is_none());
        assert_eq!(report.metadata.timezone, "America/New_York");
    }

    #[test]
    fn test_analyze_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Streaming_History_Audio_2024.json"),
            json!([{"ts": "2024-01-15T08:00:00Z", "ms_played": 1500}]).to_string(),
        )
        .unwrap();

        let report = analyze_path(dir.path(), &AnalysisOptions::default()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].duration_seconds, Some(2));
    }
}
