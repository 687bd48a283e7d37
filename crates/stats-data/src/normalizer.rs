//! Raw export records → canonical [`NormalizedPlayEvent`]s.
//!
//! The mapping from export field names to canonical fields is a fixed table
//! ([`FIELD_MAP`]). Fields not in the table (`ip_addr`, `offline_timestamp`,
//! podcast metadata, …) are dropped. Coercion failures never abort the batch:
//! the affected field becomes `None` and the record is kept.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stats_core::data_processors::{DurationConverter, FieldCoercion, TimestampProcessor};
use stats_core::models::{NormalizedPlayEvent, RawPlayEvent};
use tracing::{debug, warn};

use crate::ABORT_CHECK_INTERVAL;

// ── Field mapping ─────────────────────────────────────────────────────────────

/// Canonical field a raw export field maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Timestamp,
    Platform,
    DurationSeconds,
    ConnectionCountry,
    TrackName,
    ArtistName,
    AlbumName,
    TrackUri,
    StartReason,
    EndReason,
    Shuffle,
    Skipped,
    Offline,
    Incognito,
}

/// Export field name → canonical field.
pub const FIELD_MAP: &[(&str, CanonicalField)] = &[
    ("ts", CanonicalField::Timestamp),
    ("platform", CanonicalField::Platform),
    ("ms_played", CanonicalField::DurationSeconds),
    ("conn_country", CanonicalField::ConnectionCountry),
    ("master_metadata_track_name", CanonicalField::TrackName),
    ("master_metadata_album_artist_name", CanonicalField::ArtistName),
    ("master_metadata_album_album_name", CanonicalField::AlbumName),
    ("spotify_track_uri", CanonicalField::TrackUri),
    ("reason_start", CanonicalField::StartReason),
    ("reason_end", CanonicalField::EndReason),
    ("shuffle", CanonicalField::Shuffle),
    ("skipped", CanonicalField::Skipped),
    ("offline", CanonicalField::Offline),
    ("incognito_mode", CanonicalField::Incognito),
];

/// Look up the canonical field for an export field name.
pub fn canonical_field(raw_name: &str) -> Option<CanonicalField> {
    FIELD_MAP
        .iter()
        .find(|(name, _)| *name == raw_name)
        .map(|(_, field)| *field)
}

// ── CoercionReport ────────────────────────────────────────────────────────────

/// Per-batch tally of values that were present but could not be coerced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionReport {
    /// Non-null `ts` values that are not ISO 8601.
    pub unparseable_timestamps: u64,
    /// Non-null `ms_played` values that are not a non-negative number.
    pub invalid_durations: u64,
    /// Raw fields dropped because they are not part of the mapping.
    pub ignored_fields: u64,
}

// ── Normalizer ────────────────────────────────────────────────────────────────

/// Stateless converter from raw to normalized play events.
pub struct Normalizer;

impl Normalizer {
    /// Normalize every event, preserving order and count.
    pub fn normalize(raw: &[RawPlayEvent]) -> Vec<NormalizedPlayEvent> {
        Self::normalize_with_report(raw).0
    }

    /// Normalize every event and report how many coercions failed.
    pub fn normalize_with_report(
        raw: &[RawPlayEvent],
    ) -> (Vec<NormalizedPlayEvent>, CoercionReport) {
        let (records, report) = Self::normalize_chunks(raw, || false).unwrap_or_default();
        Self::log_summary(records.len(), &report);
        (records, report)
    }

    /// Same as [`Normalizer::normalize_with_report`], but gives up with `None`
    /// once `abort` is set. The flag is checked every
    /// [`ABORT_CHECK_INTERVAL`] events.
    pub fn normalize_abortable(
        raw: &[RawPlayEvent],
        abort: &AtomicBool,
    ) -> Option<(Vec<NormalizedPlayEvent>, CoercionReport)> {
        let Some((records, report)) =
            Self::normalize_chunks(raw, || abort.load(Ordering::Acquire))
        else {
            debug!("normalization aborted");
            return None;
        };
        Self::log_summary(records.len(), &report);
        Some((records, report))
    }

    fn normalize_chunks(
        raw: &[RawPlayEvent],
        aborted: impl Fn() -> bool,
    ) -> Option<(Vec<NormalizedPlayEvent>, CoercionReport)> {
        let mut report = CoercionReport::default();
        let mut records = Vec::with_capacity(raw.len());
        for chunk in raw.chunks(ABORT_CHECK_INTERVAL) {
            if aborted() {
                return None;
            }
            records.extend(
                chunk
                    .iter()
                    .map(|event| Self::normalize_event(event, &mut report)),
            );
        }
        Some((records, report))
    }

    fn log_summary(records: usize, report: &CoercionReport) {
        if report.unparseable_timestamps > 0 || report.invalid_durations > 0 {
            warn!(
                "{} of {} records had an unparseable timestamp, {} an invalid duration",
                report.unparseable_timestamps, records, report.invalid_durations
            );
        }
        debug!(
            "normalized {} records ({} unmapped fields dropped)",
            records, report.ignored_fields
        );
    }

    /// Normalize a single event, recording coercion failures in `report`.
    pub fn normalize_event(raw: &RawPlayEvent, report: &mut CoercionReport) -> NormalizedPlayEvent {
        let mut record = NormalizedPlayEvent::default();

        for (name, value) in raw.fields() {
            match canonical_field(name) {
                Some(field) => Self::apply(&mut record, field, value, report),
                None => report.ignored_fields += 1,
            }
        }

        record
    }

    fn apply(
        record: &mut NormalizedPlayEvent,
        field: CanonicalField,
        value: &Value,
        report: &mut CoercionReport,
    ) {
        match field {
            CanonicalField::Timestamp => {
                record.timestamp = TimestampProcessor::parse(value);
                if record.timestamp.is_none() && !value.is_null() {
                    report.unparseable_timestamps += 1;
                }
            }
            CanonicalField::DurationSeconds => {
                record.duration_seconds = DurationConverter::to_seconds(value);
                if record.duration_seconds.is_none() && !value.is_null() {
                    report.invalid_durations += 1;
                }
            }
            CanonicalField::Platform => record.platform = FieldCoercion::string(value),
            CanonicalField::ConnectionCountry => {
                record.connection_country = FieldCoercion::string(value)
            }
            CanonicalField::TrackName => record.track_name = FieldCoercion::string(value),
            CanonicalField::ArtistName => record.artist_name = FieldCoercion::string(value),
            CanonicalField::AlbumName => record.album_name = FieldCoercion::string(value),
            CanonicalField::TrackUri => record.track_uri = FieldCoercion::string(value),
            CanonicalField::StartReason => record.start_reason = FieldCoercion::string(value),
            CanonicalField::EndReason => record.end_reason = FieldCoercion::string(value),
            CanonicalField::Shuffle => record.shuffle = FieldCoercion::flag(value),
            CanonicalField::Skipped => record.skipped = FieldCoercion::flag(value),
            CanonicalField::Offline => record.offline = FieldCoercion::flag(value),
            CanonicalField::Incognito => record.incognito = FieldCoercion::flag(value),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
