//! Derived metrics computed from normalized records or aggregate views.
//!
//! Every function here is pure. Ratios and statistics that cannot be defined
//! for the given input (division by zero, zero variance, no data) come back as
//! `None` instead of a silent `0.0` or `NaN`.

use std::cmp::Ordering;

use chrono_tz::Tz;

use crate::models::{
    AggregateEntry, AggregateView, CorrelationMatrix, DurationHistogram, DurationSummary,
    HistogramBin, NormalizedPlayEvent, NullCounts, NumericField, PlaybackModes, SkipProportion,
};

// ── Percentile helper ─────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using standard linear
/// interpolation (the same algorithm used by NumPy's `percentile` function).
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> Option<f64> {
    let len = sorted_data.len();
    match len {
        0 => None,
        1 => Some(sorted_data[0]),
        _ => {
            let rank = (p / 100.0) * (len as f64 - 1.0);
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                return Some(sorted_data[lo]);
            }
            let frac = rank - lo as f64;
            Some(sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo]))
        }
    }
}

// ── SkipMetrics ───────────────────────────────────────────────────────────────

/// Skip ratios and skip-based rankings.
pub struct SkipMetrics;

impl SkipMetrics {
    /// `skips / plays`, or `None` when `plays` is zero.
    pub fn ratio(skips: u64, plays: u64) -> Option<f64> {
        if plays == 0 {
            return None;
        }
        Some(skips as f64 / plays as f64)
    }

    /// Share of all records that were skipped.
    pub fn proportion(records: &[NormalizedPlayEvent]) -> SkipProportion {
        let total = records.len() as u64;
        let skipped = records.iter().filter(|r| r.skipped).count() as u64;
        SkipProportion {
            skipped,
            total,
            proportion: Self::ratio(skipped, total),
        }
    }

    /// Entries of `view` ordered by skip ratio (highest first), then by play
    /// count (highest first), then by key; truncated to `n`.
    pub fn skip_ratio_ranking(view: &AggregateView, n: usize) -> Vec<AggregateEntry> {
        let mut ranked = view.entries.clone();
        ranked.sort_by(|a, b| {
            let ra = a.skip_ratio.unwrap_or(f64::NEG_INFINITY);
            let rb = b.skip_ratio.unwrap_or(f64::NEG_INFINITY);
            rb.total_cmp(&ra)
                .then_with(|| b.plays.cmp(&a.plays))
                .then_with(|| a.key.cmp(&b.key))
        });
        ranked.truncate(n);
        ranked
    }

    /// Entries of `view` with at least one skip, ordered by skip count
    /// (highest first) then key; truncated to `n`.
    pub fn most_skipped(view: &AggregateView, n: usize) -> Vec<AggregateEntry> {
        let mut ranked: Vec<AggregateEntry> = view
            .entries
            .iter()
            .filter(|e| e.skips > 0)
            .cloned()
            .collect();
        ranked.sort_by(|a, b| b.skips.cmp(&a.skips).then_with(|| a.key.cmp(&b.key)));
        ranked.truncate(n);
        ranked
    }
}

// ── CorrelationCalculator ─────────────────────────────────────────────────────

/// Pairwise-complete Pearson correlation over the numeric record fields.
pub struct CorrelationCalculator;

impl CorrelationCalculator {
    /// Build the full symmetric matrix over [`NumericField::ALL`].
    ///
    /// Each cell only uses records where both fields are non-null, so every
    /// pair of fields has its own exclusion set.
    pub fn matrix(records: &[NormalizedPlayEvent], tz: Tz) -> CorrelationMatrix {
        let fields = NumericField::ALL.to_vec();
        let columns: Vec<Vec<Option<f64>>> = fields
            .iter()
            .map(|f| records.iter().map(|r| Self::value(r, *f, tz)).collect())
            .collect();

        let mut values = vec![vec![None; fields.len()]; fields.len()];
        for i in 0..fields.len() {
            for j in i..fields.len() {
                let pairs: Vec<(f64, f64)> = columns[i]
                    .iter()
                    .zip(&columns[j])
                    .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                    .collect();
                let cell = if i == j {
                    // Exactly 1.0 whenever the column varies.
                    Self::pearson(&pairs).map(|_| 1.0)
                } else {
                    Self::pearson(&pairs)
                };
                values[i][j] = cell;
                values[j][i] = cell;
            }
        }

        CorrelationMatrix { fields, values }
    }

    /// Pearson's r for paired observations.
    ///
    /// Returns `None` with fewer than two pairs or when either side has zero
    /// variance. The result is clamped to `[-1, 1]`.
    pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
        if pairs.len() < 2 {
            return None;
        }
        let n = pairs.len() as f64;
        let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for (x, y) in pairs {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }

        if sxx <= 0.0 || syy <= 0.0 {
            return None;
        }
        Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
    }

    fn value(record: &NormalizedPlayEvent, field: NumericField, tz: Tz) -> Option<f64> {
        match field {
            NumericField::DurationSeconds => record.duration_seconds.map(|d| d as f64),
            NumericField::HourOfDay => record.hour_of_day(tz).map(f64::from),
        }
    }
}

// ── DurationStatistics ────────────────────────────────────────────────────────

/// Descriptive statistics over the known play durations.
pub struct DurationStatistics;

impl DurationStatistics {
    /// Count, mean, sample standard deviation, extremes and quartiles.
    pub fn summary(records: &[NormalizedPlayEvent]) -> DurationSummary {
        let mut durations: Vec<u64> = records.iter().filter_map(|r| r.duration_seconds).collect();
        if durations.is_empty() {
            return DurationSummary::default();
        }
        durations.sort_unstable();

        let sorted: Vec<f64> = durations.iter().map(|d| *d as f64).collect();
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std_dev = (sorted.len() > 1).then(|| {
            let ss: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        });

        DurationSummary {
            count: sorted.len(),
            mean: Some(mean),
            std_dev,
            min: durations.first().copied(),
            p25: percentile(&sorted, 25.0),
            median: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            max: durations.last().copied(),
        }
    }

    /// Equal-width histogram with `bins` bins over `[min, max]`.
    ///
    /// When every duration is equal the range is widened to
    /// `[value - 0.5, value + 0.5]` so all values land in a single bin.
    pub fn histogram(records: &[NormalizedPlayEvent], bins: usize) -> DurationHistogram {
        let values: Vec<f64> = records
            .iter()
            .filter_map(|r| r.duration_seconds)
            .map(|d| d as f64)
            .collect();
        if bins == 0 || values.is_empty() {
            return DurationHistogram::default();
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = match min.partial_cmp(&max) {
            Some(Ordering::Less) => (min, max),
            _ => (min - 0.5, max + 0.5),
        };
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0u64; bins];
        for v in &values {
            let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let bins = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: lo + width * i as f64,
                upper: lo + width * (i + 1) as f64,
                count,
            })
            .collect();
        DurationHistogram { bins }
    }
}

// ── Record tallies ────────────────────────────────────────────────────────────

/// Totals of shuffle, offline and incognito plays.
pub fn playback_modes(records: &[NormalizedPlayEvent]) -> PlaybackModes {
    records.iter().fold(PlaybackModes::default(), |mut acc, r| {
        acc.shuffle += u64::from(r.shuffle);
        acc.offline += u64::from(r.offline);
        acc.incognito += u64::from(r.incognito);
        acc
    })
}

/// Null value count per nullable column.
pub fn null_counts(records: &[NormalizedPlayEvent]) -> NullCounts {
    let mut counts = NullCounts::default();
    for record in records {
        counts.add(record);
    }
    counts
}

// ── Tests ─────────────────────────────────────────────────────────────────────
