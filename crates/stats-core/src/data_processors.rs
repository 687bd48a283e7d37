use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Strict ISO 8601 timestamp parsing for the `ts` field.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to parse a [`serde_json::Value`] into a UTC [`DateTime`].
    ///
    /// Handles:
    /// * JSON string → RFC 3339 (`Z` suffix or numeric offset), or an
    ///   offset-less `YYYY-MM-DDTHH:MM:SS[.fff]` which is taken as UTC.
    /// * anything else (null, numbers, objects) → `None`.
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => Self::parse_str(s.as_str()),
            _ => None,
        }
    }

    /// Parse a timestamp string; see [`TimestampProcessor::parse`].
    pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];
        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        debug!("TimestampProcessor: could not parse timestamp \"{}\"", s);
        None
    }
}

// ── DurationConverter ─────────────────────────────────────────────────────────

const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// Converts `ms_played` values into whole seconds.
pub struct DurationConverter;

impl DurationConverter {
    /// Convert a millisecond value to seconds, rounding half to even.
    ///
    /// Integers and finite non-negative floats are accepted. Strings, booleans,
    /// negative or non-finite numbers, and floats whose second count does not
    /// fit in a `u64` yield `None`.
    pub fn to_seconds(value: &Value) -> Option<u64> {
        let Value::Number(n) = value else {
            return None;
        };
        if let Some(ms) = n.as_u64() {
            return Some(Self::millis_to_seconds(ms));
        }
        let ms = n.as_f64()?;
        if !ms.is_finite() || ms < 0.0 {
            return None;
        }
        let seconds = (ms / 1000.0).round_ties_even();
        // 2^64 is the first float above u64::MAX; `as` would saturate.
        if seconds >= U64_LIMIT {
            return None;
        }
        Some(seconds as u64)
    }

    /// `round(ms / 1000)` with ties going to the even second.
    ///
    /// # Examples
    ///
    /// ```
    /// use stats_core::data_processors::DurationConverter;
    ///
    /// assert_eq!(DurationConverter::millis_to_seconds(1_500), 2);
    /// assert_eq!(DurationConverter::millis_to_seconds(2_500), 2);
    /// assert_eq!(DurationConverter::millis_to_seconds(2_501), 3);
    /// ```
    pub fn millis_to_seconds(ms: u64) -> u64 {
        let whole = ms / 1000;
        let rem = ms % 1000;
        match rem.cmp(&500) {
            std::cmp::Ordering::Less => whole,
            std::cmp::Ordering::Greater => whole + 1,
            std::cmp::Ordering::Equal => whole + (whole % 2),
        }
    }
}

// ── FieldCoercion ─────────────────────────────────────────────────────────────

/// Lenient coercions for the remaining loosely-typed export fields.
pub struct FieldCoercion;

impl FieldCoercion {
    /// JSON strings are kept verbatim; every other type becomes `None`.
    pub fn string(value: &Value) -> Option<String> {
        value.as_str().map(str::to_string)
    }

    /// JSON booleans are kept; absent, null or other types become `false`.
    pub fn flag(value: &Value) -> bool {
        value.as_bool().unwrap_or(false)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
