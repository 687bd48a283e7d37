//! Grouped play statistics over normalized records.
//!
//! Every view is an independent, read-only pass over the same record slice.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono_tz::Tz;
use stats_core::calculations::SkipMetrics;
use stats_core::formatting::round_to;
use stats_core::models::{
    AggregateEntry, AggregateView, Dimension, GroupKey, NormalizedPlayEvent,
};

use crate::ABORT_CHECK_INTERVAL;

// ── GroupStats ────────────────────────────────────────────────────────────────

/// Running totals for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupStats {
    pub plays: u64,
    pub skips: u64,
    pub duration_seconds: u64,
}

impl GroupStats {
    /// Add a single record to the running totals.
    pub fn add_record(&mut self, record: &NormalizedPlayEvent) {
        self.plays += 1;
        self.skips += u64::from(record.skipped);
        // Saturates instead of wrapping on absurd inputs.
        self.duration_seconds = self
            .duration_seconds
            .saturating_add(record.duration_seconds.unwrap_or(0));
    }

    fn into_entry(self, key: GroupKey) -> AggregateEntry {
        AggregateEntry {
            label: key.label(),
            key,
            plays: self.plays,
            skips: self.skips,
            total_duration_seconds: self.duration_seconds,
            total_duration_minutes: round_to(self.duration_seconds as f64 / 60.0, 2),
            skip_ratio: SkipMetrics::ratio(self.skips, self.plays),
        }
    }
}

// ── Groups ────────────────────────────────────────────────────────────────────

/// Partial aggregation state for one dimension.
#[derive(Debug, Default)]
struct Groups {
    // BTreeMap keeps keys in natural order.
    stats: BTreeMap<GroupKey, GroupStats>,
    unparseable_timestamps: u64,
}

impl Groups {
    fn into_view(self, dimension: Dimension) -> AggregateView {
        let mut entries: Vec<AggregateEntry> = self
            .stats
            .into_iter()
            .map(|(key, stats)| stats.into_entry(key))
            .collect();

        if !dimension.is_chronological() {
            // Stable sort keeps natural key order among equal play counts.
            entries.sort_by(|a, b| b.plays.cmp(&a.plays));
        }

        AggregateView {
            dimension,
            entries,
            unparseable_timestamps: self.unparseable_timestamps,
        }
    }
}

// ── PlayAggregator ────────────────────────────────────────────────────────────

/// Groups records by a [`Dimension`].
///
/// Time-derived keys (month, hour, weekday) are computed in `tz`.
#[derive(Debug, Clone, Copy)]
pub struct PlayAggregator {
    tz: Tz,
}

impl Default for PlayAggregator {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl PlayAggregator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Grouping key of `record` for `dimension`.
    ///
    /// Returns `None` only for time-bucketed dimensions when the record has no
    /// timestamp. Null values of every other field produce the unknown key of
    /// the dimension instead.
    pub fn key_for(&self, record: &NormalizedPlayEvent, dimension: Dimension) -> Option<GroupKey> {
        let key = match dimension {
            Dimension::Track => GroupKey::Track {
                track: record.track_name.clone(),
                artist: record.artist_name.clone(),
            },
            Dimension::Artist => GroupKey::Artist(record.artist_name.clone()),
            Dimension::Album => GroupKey::Album {
                album: record.album_name.clone(),
                artist: record.artist_name.clone(),
            },
            Dimension::MonthYear => GroupKey::MonthYear(record.month_year(self.tz)?),
            Dimension::HourOfDay => GroupKey::Hour(record.hour_of_day(self.tz)?),
            Dimension::Weekday => GroupKey::Weekday(record.weekday(self.tz)?),
            Dimension::Platform => GroupKey::Platform(record.platform.clone()),
            Dimension::Country => GroupKey::Country(record.connection_country.clone()),
            Dimension::SkipState => GroupKey::Skipped(record.skipped),
            Dimension::StartReason => GroupKey::StartReason(record.start_reason.clone()),
            Dimension::EndReason => GroupKey::EndReason(record.end_reason.clone()),
        };
        Some(key)
    }

    /// Aggregate `records` over `dimension`.
    ///
    /// Entries are ordered by descending play count with ties broken by the
    /// key's natural order, except for chronological dimensions which keep
    /// the natural order throughout.
    pub fn aggregate_by(
        &self,
        records: &[NormalizedPlayEvent],
        dimension: Dimension,
    ) -> AggregateView {
        let mut groups = Groups::default();
        self.accumulate(&mut groups, records, dimension);
        groups.into_view(dimension)
    }

    /// Same as [`PlayAggregator::aggregate_by`], but gives up with `None`
    /// once `abort` is set. The flag is checked every
    /// [`ABORT_CHECK_INTERVAL`] records.
    pub fn aggregate_by_abortable(
        &self,
        records: &[NormalizedPlayEvent],
        dimension: Dimension,
        abort: &AtomicBool,
    ) -> Option<AggregateView> {
        let mut groups = Groups::default();
        for chunk in records.chunks(ABORT_CHECK_INTERVAL) {
            if abort.load(Ordering::Acquire) {
                return None;
            }
            self.accumulate(&mut groups, chunk, dimension);
        }
        Some(groups.into_view(dimension))
    }

    fn accumulate(
        &self,
        groups: &mut Groups,
        records: &[NormalizedPlayEvent],
        dimension: Dimension,
    ) {
        for record in records {
            match self.key_for(record, dimension) {
                Some(key) => groups.stats.entry(key).or_default().add_record(record),
                None => groups.unparseable_timestamps += 1,
            }
        }
    }

    /// Aggregate over every dimension in [`Dimension::ALL`] order.
    pub fn aggregate_all(&self, records: &[NormalizedPlayEvent]) -> Vec<AggregateView> {
        Dimension::ALL
            .iter()
            .map(|d| self.aggregate_by(records, *d))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
