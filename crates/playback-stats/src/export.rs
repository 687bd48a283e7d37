use std::path::Path;

use anyhow::Context;
use stats_data::analysis::AnalysisReport;

/// Write `report` as pretty JSON to `path`.
///
/// The file is written next to the target and renamed into place, so readers
/// never see a partially written export.
pub fn export_report(report: &AnalysisReport, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(report).context("serializing report")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;

    tracing::info!("Report exported to {}", path.display());
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use stats_data::analysis::{analyze_events, AnalysisOptions};
    use stats_data::ingest::ingest;
    use tempfile::TempDir;

    fn report() -> AnalysisReport {
        let raw = ingest(json!([
            {
                "ts": "2024-01-15T08:00:00Z",
                "ms_played": 2500,
                "master_metadata_track_name": "A",
                "master_metadata_album_artist_name": "X"
            },
            {"ts": 1705312800, "ms_played": "long"}
        ]))
        .unwrap();
        analyze_events(&raw, &AnalysisOptions::default()).unwrap()
    }

    #[test]
    fn test_export_writes_records_and_views() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");

        export_report(&report(), &path).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let records = value["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["duration_seconds"], json!(2));
        assert_eq!(records[0]["timestamp"], json!("2024-01-15T08:00:00Z"));
        assert_eq!(records[1]["timestamp"], Value::Null);
        assert_eq!(records[1]["duration_seconds"], Value::Null);
        assert_eq!(value["views"].as_array().unwrap().len(), 11);
        assert_eq!(value["views"][0]["dimension"], json!("track"));
    }

    #[test]
    fn test_export_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        export_report(&report(), &path).unwrap();
        export_report(&report(), &path).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["report.json".to_string()]);
    }
}
