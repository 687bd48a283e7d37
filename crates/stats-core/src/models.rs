use std::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── RawPlayEvent ──────────────────────────────────────────────────────────────

/// One playback record exactly as it appears in a streaming-history export.
///
/// Nothing about the contents is guaranteed: any field may be missing, null,
/// or of an unexpected JSON type. The normalizer is responsible for turning
/// this into a [`NormalizedPlayEvent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPlayEvent(Map<String, Value>);

impl RawPlayEvent {
    /// Wrap an already-decoded JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Look up a raw field by its export name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterate over every `(name, value)` pair present on the record.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of raw fields present.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawPlayEvent {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

// ── NormalizedPlayEvent ───────────────────────────────────────────────────────

/// Canonical, fully-typed playback record.
///
/// Field names and order are the export column schema; derived values such as
/// the month bucket or the hour of day are computed from `timestamp` on demand
/// and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPlayEvent {
    /// UTC instant the playback ended, `None` when the source was unparseable.
    pub timestamp: Option<DateTime<Utc>>,
    /// Client platform string, e.g. `"android"`.
    pub platform: Option<String>,
    /// Play duration in whole seconds (half-to-even rounding of milliseconds).
    pub duration_seconds: Option<u64>,
    /// Two-letter country code of the connection.
    pub connection_country: Option<String>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    /// Opaque track identifier.
    pub track_uri: Option<String>,
    pub start_reason: Option<String>,
    pub end_reason: Option<String>,
    pub shuffle: bool,
    pub skipped: bool,
    pub offline: bool,
    pub incognito: bool,
}

impl NormalizedPlayEvent {
    /// The timestamp converted into the bucketing timezone.
    pub fn local_timestamp(&self, tz: Tz) -> Option<DateTime<Tz>> {
        self.timestamp.map(|ts| ts.with_timezone(&tz))
    }

    /// Calendar month bucket of the timestamp.
    pub fn month_year(&self, tz: Tz) -> Option<MonthYear> {
        self.local_timestamp(tz)
            .map(|ts| MonthYear::new(ts.year(), ts.month()))
    }

    /// Hour of day (0–23) of the timestamp.
    pub fn hour_of_day(&self, tz: Tz) -> Option<u32> {
        self.local_timestamp(tz).map(|ts| ts.hour())
    }

    /// Day of week of the timestamp.
    pub fn weekday(&self, tz: Tz) -> Option<DayOfWeek> {
        self.local_timestamp(tz)
            .map(|ts| DayOfWeek::from_chrono(ts.weekday()))
    }
}

// ── MonthYear ─────────────────────────────────────────────────────────────────

/// Structured calendar-month key.
///
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthYear {
    pub year: i32,
    /// 1-based month.
    pub month: u32,
}

impl MonthYear {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ── DayOfWeek ─────────────────────────────────────────────────────────────────

/// Weekday labels indexed by `Monday = 0 … Sunday = 6`.
pub const WEEKDAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Day of week as a Monday-based ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    /// Build from a Monday-based ordinal; `None` outside `0..=6`.
    pub fn from_index(index: u8) -> Option<Self> {
        (usize::from(index) < WEEKDAY_LABELS.len()).then_some(Self(index))
    }

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        // num_days_from_monday is always within 0..=6.
        Self(day.num_days_from_monday() as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        WEEKDAY_LABELS[usize::from(self.0)]
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Dimension ─────────────────────────────────────────────────────────────────

/// A grouping dimension the aggregator can summarise over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Track,
    Artist,
    Album,
    MonthYear,
    HourOfDay,
    Weekday,
    Platform,
    Country,
    SkipState,
    StartReason,
    EndReason,
}

impl Dimension {
    /// Every dimension, in report order.
    pub const ALL: [Dimension; 11] = [
        Dimension::Track,
        Dimension::Artist,
        Dimension::Album,
        Dimension::MonthYear,
        Dimension::HourOfDay,
        Dimension::Weekday,
        Dimension::Platform,
        Dimension::Country,
        Dimension::SkipState,
        Dimension::StartReason,
        Dimension::EndReason,
    ];

    /// Stable snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::MonthYear => "month_year",
            Self::HourOfDay => "hour_of_day",
            Self::Weekday => "weekday",
            Self::Platform => "platform",
            Self::Country => "country",
            Self::SkipState => "skip_state",
            Self::StartReason => "start_reason",
            Self::EndReason => "end_reason",
        }
    }

    /// Human-readable title used by the console report.
    pub fn title(self) -> &'static str {
        match self {
            Self::Track => "Tracks",
            Self::Artist => "Artists",
            Self::Album => "Albums",
            Self::MonthYear => "Plays per month",
            Self::HourOfDay => "Plays per hour of day",
            Self::Weekday => "Plays per weekday",
            Self::Platform => "Platforms",
            Self::Country => "Connection countries",
            Self::SkipState => "Skipped vs not skipped",
            Self::StartReason => "Start reasons",
            Self::EndReason => "End reasons",
        }
    }

    /// Dimensions keyed on the timestamp; null timestamps are excluded.
    pub fn is_time_bucketed(self) -> bool {
        matches!(self, Self::MonthYear | Self::HourOfDay | Self::Weekday)
    }

    /// Dimensions presented in their natural order rather than by play count.
    pub fn is_chronological(self) -> bool {
        matches!(self, Self::MonthYear | Self::Weekday)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── GroupKey ──────────────────────────────────────────────────────────────────

/// Label used for the group formed by records whose key field is null.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Grouping key of one aggregate entry.
///
/// `None` inside a variant is the "unknown" bucket. The derived ordering is
/// the natural ascending order used to break play-count ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum GroupKey {
    Track {
        track: Option<String>,
        artist: Option<String>,
    },
    Artist(Option<String>),
    Album {
        album: Option<String>,
        artist: Option<String>,
    },
    MonthYear(MonthYear),
    Hour(u32),
    Weekday(DayOfWeek),
    Platform(Option<String>),
    Country(Option<String>),
    Skipped(bool),
    StartReason(Option<String>),
    EndReason(Option<String>),
}

impl GroupKey {
    /// Human-readable label for reports.
    pub fn label(&self) -> String {
        fn or_unknown(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or(UNKNOWN_LABEL)
        }

        match self {
            Self::Track { track, artist } => {
                format!("{} / {}", or_unknown(track), or_unknown(artist))
            }
            Self::Album { album, artist } => {
                format!("{} / {}", or_unknown(album), or_unknown(artist))
            }
            Self::Artist(v)
            | Self::Platform(v)
            | Self::Country(v)
            | Self::StartReason(v)
            | Self::EndReason(v) => or_unknown(v).to_string(),
            Self::MonthYear(m) => m.to_string(),
            Self::Hour(h) => format!("{:02}:00", h),
            Self::Weekday(d) => d.label().to_string(),
            Self::Skipped(true) => "Skipped".to_string(),
            Self::Skipped(false) => "Not skipped".to_string(),
        }
    }

    /// Whether this key is the unknown bucket of its dimension.
    pub fn is_unknown(&self) -> bool {
        match self {
            Self::Track { track, artist } => track.is_none() && artist.is_none(),
            Self::Album { album, artist } => album.is_none() && artist.is_none(),
            Self::Artist(v)
            | Self::Platform(v)
            | Self::Country(v)
            | Self::StartReason(v)
            | Self::EndReason(v) => v.is_none(),
            Self::MonthYear(_) | Self::Hour(_) | Self::Weekday(_) | Self::Skipped(_) => false,
        }
    }
}

// ── AggregateEntry / AggregateView ────────────────────────────────────────────

/// Summary of all plays sharing one grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEntry {
    pub key: GroupKey,
    pub label: String,
    pub plays: u64,
    pub skips: u64,
    /// Sum of known durations; plays with a null duration contribute nothing.
    pub total_duration_seconds: u64,
    /// `total_duration_seconds / 60`, rounded to two decimals.
    pub total_duration_minutes: f64,
    /// `skips / plays`; `None` only if the group had no plays.
    pub skip_ratio: Option<f64>,
}

/// Ordered grouped summary over one [`Dimension`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateView {
    pub dimension: Dimension,
    pub entries: Vec<AggregateEntry>,
    /// Records left out because the dimension needs a timestamp and the
    /// record had none. Always 0 for dimensions that are not time-bucketed.
    pub unparseable_timestamps: u64,
}

impl AggregateView {
    /// The first `n` entries in presentation order.
    pub fn top(&self, n: usize) -> &[AggregateEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Sum of play counts across all groups.
    pub fn total_plays(&self) -> u64 {
        self.entries.iter().map(|e| e.plays).sum()
    }

    /// Sum of skip counts across all groups.
    pub fn total_skips(&self) -> u64 {
        self.entries.iter().map(|e| e.skips).sum()
    }

    /// Find the entry for `key`, if the group exists.
    pub fn get(&self, key: &GroupKey) -> Option<&AggregateEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Derived metric results ────────────────────────────────────────────────────

/// Share of all plays that were skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkipProportion {
    pub skipped: u64,
    pub total: u64,
    /// `skipped / total`; `None` for an empty dataset.
    pub proportion: Option<f64>,
}

impl SkipProportion {
    pub fn not_skipped(&self) -> u64 {
        self.total - self.skipped
    }
}

/// Numeric fields that take part in the correlation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    DurationSeconds,
    HourOfDay,
}

impl NumericField {
    pub const ALL: [NumericField; 2] = [NumericField::DurationSeconds, NumericField::HourOfDay];

    pub fn name(self) -> &'static str {
        match self {
            Self::DurationSeconds => "duration_seconds",
            Self::HourOfDay => "hour_of_day",
        }
    }
}

/// Symmetric Pearson correlation table.
///
/// A `None` cell is undefined: one of the two columns had zero variance over
/// the pairwise-complete observations, or there were fewer than two of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<NumericField>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Correlation between two fields, `None` if undefined or not tracked.
    pub fn get(&self, a: NumericField, b: NumericField) -> Option<f64> {
        let i = self.fields.iter().position(|f| *f == a)?;
        let j = self.fields.iter().position(|f| *f == b)?;
        self.values[i][j]
    }
}

/// Totals of the boolean playback modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackModes {
    pub shuffle: u64,
    pub offline: u64,
    pub incognito: u64,
}

impl PlaybackModes {
    /// `(label, count)` rows in a fixed order.
    pub fn labelled(&self) -> [(&'static str, u64); 3] {
        [
            ("Plays in shuffle mode", self.shuffle),
            ("Plays in offline mode", self.offline),
            ("Plays in incognito mode", self.incognito),
        ]
    }
}

/// Descriptive statistics of the non-null `duration_seconds` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationSummary {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; undefined with fewer than two values.
    pub std_dev: Option<f64>,
    pub min: Option<u64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<u64>,
}

/// One equal-width histogram bin, `[lower, upper)` except the last one which
/// also includes `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// Distribution of play durations in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationHistogram {
    pub bins: Vec<HistogramBin>,
}

impl DurationHistogram {
    pub fn total(&self) -> u64 {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Number of null values per nullable column of [`NormalizedPlayEvent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullCounts {
    pub timestamp: u64,
    pub platform: u64,
    pub duration_seconds: u64,
    pub connection_country: u64,
    pub track_name: u64,
    pub artist_name: u64,
    pub album_name: u64,
    pub track_uri: u64,
    pub start_reason: u64,
    pub end_reason: u64,
}

impl NullCounts {
    /// Tally one record.
    pub fn add(&mut self, record: &NormalizedPlayEvent) {
        self.timestamp += u64::from(record.timestamp.is_none());
        self.platform += u64::from(record.platform.is_none());
        self.duration_seconds += u64::from(record.duration_seconds.is_none());
        self.connection_country += u64::from(record.connection_country.is_none());
        self.track_name += u64::from(record.track_name.is_none());
        self.artist_name += u64::from(record.artist_name.is_none());
        self.album_name += u64::from(record.album_name.is_none());
        self.track_uri += u64::from(record.track_uri.is_none());
        self.start_reason += u64::from(record.start_reason.is_none());
        self.end_reason += u64::from(record.end_reason.is_none());
    }

    /// `(column, nulls)` rows in schema order.
    pub fn columns(&self) -> [(&'static str, u64); 10] {
        [
            ("timestamp", self.timestamp),
            ("platform", self.platform),
            ("duration_seconds", self.duration_seconds),
            ("connection_country", self.connection_country),
            ("track_name", self.track_name),
            ("artist_name", self.artist_name),
            ("album_name", self.album_name),
            ("track_uri", self.track_uri),
            ("start_reason", self.start_reason),
            ("end_reason", self.end_reason),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
