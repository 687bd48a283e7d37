//! Plain-text console report.

use std::fmt::Write;

use stats_core::formatting::{
    format_count, format_number, format_optional, format_ratio, format_time, UNDEFINED,
};
use stats_core::models::{AggregateEntry, AggregateView, Dimension, DurationHistogram};
use stats_data::analysis::AnalysisReport;

const LABEL_WIDTH: usize = 44;
const BAR_WIDTH: usize = 40;

/// Render the whole report. `top` limits the count-ordered tables; the
/// chronological and hourly tables are always complete.
pub fn render_report(report: &AnalysisReport, top: usize) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report, top);
    out
}

fn write_report(out: &mut String, report: &AnalysisReport, top: usize) -> std::fmt::Result {
    let meta = &report.metadata;
    writeln!(out, "Playback statistics")?;
    writeln!(out, "  records:                {}", format_count(meta.records as u64))?;
    writeln!(out, "  timezone:               {}", meta.timezone)?;
    writeln!(
        out,
        "  unparseable timestamps: {}",
        format_count(meta.coercion.unparseable_timestamps)
    )?;
    writeln!(
        out,
        "  invalid durations:      {}",
        format_count(meta.coercion.invalid_durations)
    )?;

    if report.is_empty() {
        writeln!(out)?;
        writeln!(out, "No play records found.")?;
        return Ok(());
    }

    for dimension in [Dimension::Track, Dimension::Artist, Dimension::Album] {
        if let Some(view) = report.view(dimension) {
            write_view(out, &format!("Top {} {}", top, dimension.title()), view.top(top))?;
        }
    }

    for dimension in [Dimension::MonthYear, Dimension::HourOfDay, Dimension::Weekday] {
        if let Some(view) = report.view(dimension) {
            write_view(out, dimension.title(), &view.entries)?;
            write_unparseable(out, view)?;
        }
    }

    for dimension in [
        Dimension::Platform,
        Dimension::Country,
        Dimension::StartReason,
        Dimension::EndReason,
        Dimension::SkipState,
    ] {
        if let Some(view) = report.view(dimension) {
            write_view(out, dimension.title(), view.top(top))?;
        }
    }

    write_view(out, "Most skipped tracks", &report.most_skipped_tracks)?;
    write_view(out, "Artists by skip ratio", &report.artist_skip_ratios)?;

    section(out, "Skips")?;
    let skips = &report.skip_proportion;
    writeln!(out, "  skipped:     {}", format_count(skips.skipped))?;
    writeln!(out, "  not skipped: {}", format_count(skips.not_skipped()))?;
    writeln!(out, "  proportion:  {}", format_ratio(skips.proportion, 2))?;

    section(out, "Playback modes")?;
    for (label, count) in report.playback_modes.labelled() {
        writeln!(out, "  {:<26} {}", label, format_count(count))?;
    }

    section(out, "Play duration (seconds)")?;
    let d = &report.duration_summary;
    let whole = |v: Option<u64>| v.map_or_else(|| UNDEFINED.to_string(), format_count);
    writeln!(out, "  count:  {}", format_count(d.count as u64))?;
    writeln!(out, "  mean:   {}", format_optional(d.mean, 2))?;
    writeln!(out, "  std:    {}", format_optional(d.std_dev, 2))?;
    writeln!(out, "  min:    {}", whole(d.min))?;
    writeln!(out, "  25%:    {}", format_optional(d.p25, 2))?;
    writeln!(out, "  median: {}", format_optional(d.median, 2))?;
    writeln!(out, "  75%:    {}", format_optional(d.p75, 2))?;
    writeln!(out, "  max:    {}", whole(d.max))?;

    write_histogram(out, &report.duration_histogram)?;

    section(out, "Correlation")?;
    let fields = &report.correlation.fields;
    write!(out, "  {:<18}", "")?;
    for f in fields {
        write!(out, " {:>18}", f.name())?;
    }
    writeln!(out)?;
    for (i, f) in fields.iter().enumerate() {
        write!(out, "  {:<18}", f.name())?;
        for value in &report.correlation.values[i] {
            write!(out, " {:>18}", format_optional(*value, 4))?;
        }
        writeln!(out)?;
    }

    section(out, "Null values")?;
    for (column, nulls) in report.null_counts.columns() {
        writeln!(out, "  {:<20} {}", column, format_count(nulls))?;
    }

    Ok(())
}

fn section(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "─".repeat(title.chars().count()))
}

fn write_view(out: &mut String, title: &str, entries: &[AggregateEntry]) -> std::fmt::Result {
    section(out, title)?;
    if entries.is_empty() {
        return writeln!(out, "  (none)");
    }
    writeln!(
        out,
        "  {:<w$} {:>9} {:>8} {:>10} {:>10}",
        "",
        "plays",
        "skips",
        "time",
        "skip %",
        w = LABEL_WIDTH
    )?;
    for entry in entries {
        writeln!(
            out,
            "  {:<w$} {:>9} {:>8} {:>10} {:>10}",
            truncate(&entry.label, LABEL_WIDTH),
            format_count(entry.plays),
            format_count(entry.skips),
            format_time(entry.total_duration_minutes),
            format_ratio(entry.skip_ratio, 1),
            w = LABEL_WIDTH
        )?;
    }
    Ok(())
}

fn write_unparseable(out: &mut String, view: &AggregateView) -> std::fmt::Result {
    if view.unparseable_timestamps > 0 {
        writeln!(
            out,
            "  ({} plays without a usable timestamp)",
            format_count(view.unparseable_timestamps)
        )?;
    }
    Ok(())
}

fn write_histogram(out: &mut String, histogram: &DurationHistogram) -> std::fmt::Result {
    section(out, "Play duration distribution")?;
    let max = histogram.bins.iter().map(|b| b.count).max().unwrap_or(0);
    if max == 0 {
        return writeln!(out, "  (none)");
    }
    for bin in histogram.bins.iter().filter(|b| b.count > 0) {
        let bar = (bin.count as f64 / max as f64 * BAR_WIDTH as f64).ceil() as usize;
        writeln!(
            out,
            "  {:>10} – {:<10} {:>9} {}",
            format_number(bin.lower, 1),
            format_number(bin.upper, 1),
            format_count(bin.count),
            "█".repeat(bar)
        )?;
    }
    Ok(())
}

fn truncate(label: &str, width: usize) -> String {
    if label.chars().count() <= width {
        return label.to_string();
    }
    let mut s: String = label.chars().take(width - 1).collect();
    s.push('…');
    s
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stats_data::analysis::{analyze_events, AnalysisOptions};
    use stats_data::ingest::ingest;

    fn report() -> AnalysisReport {
        let raw = ingest(json!([
            {
                "ts": "2024-01-15T08:00:00Z",
                "ms_played": 200000,
                "platform": "android",
                "master_metadata_track_name": "A",
                "master_metadata_album_artist_name": "X",
                "skipped": true
            },
            {
                "ts": "2024-01-16T09:00:00Z",
                "ms_played": 180000,
                "master_metadata_track_name": "B",
                "master_metadata_album_artist_name": "Y",
                "shuffle": true
            }
        ]))
        .unwrap();
        analyze_events(&raw, &AnalysisOptions::default()).unwrap()
    }

    #[test]
    fn test_render_contains_sections() {
        let text = render_report(&report(), 10);
        for heading in [
            "Top 10 Tracks",
            "Top 10 Artists",
            "Plays per month",
            "Plays per weekday",
            "Most skipped tracks",
            "Artists by skip ratio",
            "Playback modes",
            "Correlation",
            "Null values",
        ] {
            assert!(text.contains(heading), "missing section {heading}");
        }
        assert!(text.contains("A / X"));
        assert!(text.contains("50.00%"));
        assert!(text.contains("Monday"));
    }

    #[test]
    fn test_render_empty_report() {
        let empty = analyze_events(&[], &AnalysisOptions::default()).unwrap();
        let text = render_report(&empty, 10);
        assert!(text.contains("No play records found."));
    }

    #[test]
    fn test_undefined_values_are_printed() {
        let raw = ingest(json!([{"ms_played": 1000}])).unwrap();
        let single = analyze_events(&raw, &AnalysisOptions::default()).unwrap();
        let text = render_report(&single, 10);
        // One duration: std and every correlation cell are undefined.
        assert!(text.contains("std:    undefined"));
    }

    #[test]
    fn test_truncate_long_labels() {
        assert_eq!(truncate("short", 10), "short");
        let long = truncate("abcdefghijkl", 5);
        assert_eq!(long.chars().count(), 5);
        assert!(long.ends_with('…'));
    }
}
