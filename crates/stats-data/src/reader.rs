//! Streaming-history file discovery and loading.
//!
//! An export is either a single JSON file or a directory of
//! `Streaming_History_Audio_*.json` files, each holding an array of play
//! records.

use std::path::{Path, PathBuf};

use regex::Regex;
use stats_core::error::{Result, StatsError};
use stats_core::models::RawPlayEvent;
use tracing::{debug, info};

use crate::ingest::ingest;

// ── Public API ────────────────────────────────────────────────────────────────

/// Find every audio history file under `dir`, sorted by path.
pub fn find_history_files(dir: &Path) -> Vec<PathBuf> {
    let pattern = Regex::new(r"^Streaming_History_Audio_.*\.json$").expect("regex is valid");

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .map(|name| pattern.is_match(name))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Decode one history file into raw play events.
pub fn read_history_file(path: &Path) -> Result<Vec<RawPlayEvent>> {
    let content = std::fs::read_to_string(path).map_err(|source| StatsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let document: serde_json::Value = serde_json::from_str(&content)?;
    let events = ingest(document)?;
    debug!("Read {} records from {}", events.len(), path.display());
    Ok(events)
}

/// Load raw play events from a file or a directory of history files.
///
/// Files in a directory are read in path order and concatenated. Any file
/// that fails to decode aborts the whole load.
pub fn load_history(path: &Path) -> Result<Vec<RawPlayEvent>> {
    if !path.exists() {
        return Err(StatsError::DataPathNotFound(path.to_path_buf()));
    }

    if path.is_file() {
        return read_history_file(path);
    }

    let files = find_history_files(path);
    if files.is_empty() {
        return Err(StatsError::NoDataFiles(path.to_path_buf()));
    }

    let mut events = Vec::new();
    for file in &files {
        events.extend(read_history_file(file)?);
    }

    info!(
        "Loaded {} records from {} history files",
        events.len(),
        files.len()
    );
    Ok(events)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn history(tracks: &[&str]) -> String {
        let records: Vec<serde_json::Value> = tracks
            .iter()
            .map(|t| {
                json!({
                    "ts": "2024-01-15T10:00:00Z",
                    "ms_played": 1000,
                    "master_metadata_track_name": t,
                })
            })
            .collect();
        serde_json::Value::Array(records).to_string()
    }

    // ── find_history_files ────────────────────────────────────────────────────

    #[test]
    fn test_find_history_files_filters_by_name() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "Streaming_History_Audio_2023.json", "[]");
        write_file(dir.path(), "Streaming_History_Audio_2024_1.json", "[]");
        write_file(dir.path(), "Streaming_History_Video_2024.json", "[]");
        write_file(dir.path(), "Userdata.json", "{}");
        write_file(dir.path(), "Streaming_History_Audio_2022.txt", "[]");

        let files = find_history_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "Streaming_History_Audio_2023.json",
                "Streaming_History_Audio_2024_1.json"
            ]
        );
    }

    #[test]
    fn test_find_history_files_recurses() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Spotify Extended Streaming History");
        std::fs::create_dir_all(&nested).unwrap();
        write_file(&nested, "Streaming_History_Audio_2024.json", "[]");

        assert_eq!(find_history_files(dir.path()).len(), 1);
    }

    // ── read_history_file ─────────────────────────────────────────────────────

    #[test]
    fn test_read_history_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "history.json", &history(&["A", "B"]));

        let events = read_history_file(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].get("master_metadata_track_name"),
            Some(&json!("B"))
        );
    }

    #[test]
    fn test_read_history_file_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "history.json", "[{\"ts\": ");
        assert!(matches!(
            read_history_file(&path),
            Err(StatsError::JsonParse(_))
        ));
    }

    #[test]
    fn test_read_history_file_not_an_array() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "history.json", "{\"ts\": \"2024\"}");
        assert!(matches!(
            read_history_file(&path),
            Err(StatsError::MalformedInput(_))
        ));
    }

    // ── load_history ──────────────────────────────────────────────────────────

    #[test]
    fn test_load_history_concatenates_in_path_order() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "Streaming_History_Audio_2024.json", &history(&["C"]));
        write_file(dir.path(), "Streaming_History_Audio_2023.json", &history(&["A", "B"]));

        let events = load_history(dir.path()).unwrap();
        let tracks: Vec<&serde_json::Value> = events
            .iter()
            .map(|e| e.get("master_metadata_track_name").unwrap())
            .collect();
        assert_eq!(tracks, vec![&json!("A"), &json!("B"), &json!("C")]);
    }

    #[test]
    fn test_load_history_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "export.json", &history(&["A"]));
        assert_eq!(load_history(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_load_history_missing_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            load_history(&missing),
            Err(StatsError::DataPathNotFound(_))
        ));
    }

    #[test]
    fn test_load_history_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_history(dir.path()),
            Err(StatsError::NoDataFiles(_))
        ));
    }

    #[test]
    fn test_load_history_fails_on_any_bad_file() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "Streaming_History_Audio_2023.json", &history(&["A"]));
        write_file(dir.path(), "Streaming_History_Audio_2024.json", "[1, 2]");
        assert!(matches!(
            load_history(dir.path()),
            Err(StatsError::MalformedInput(_))
        ));
    }
}
