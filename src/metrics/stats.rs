use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Rounds half-up to one decimal place (`2.25 -> 2.3`, `-2.25 -> -2.2`).
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

/// Raw (unrounded) hours from `start` to `end`. Negative when `end` precedes `start`.
#[allow(clippy::cast_precision_loss)]
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Hours from `start` to `end`, rounded to one decimal.
pub fn elapsed_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    round_one_decimal(hours_between(start, end))
}

/// Average, median, min and max of a numeric series.
///
/// Every field is `None` for an empty series so that "no data" stays
/// distinguishable from a real zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub avg: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Computes [`Stats`] for `values`.
///
/// `avg` and `median` are rounded to one decimal; `min` and `max` are returned
/// as given.
#[allow(clippy::cast_precision_loss)]
pub fn calculate_stats(values: &[f64]) -> Stats {
    if values.is_empty() {
        return Stats::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| cmp_f64(*a, *b));

    let sum: f64 = sorted.iter().sum();
    let avg = sum / sorted.len() as f64;

    Stats {
        avg: Some(round_one_decimal(avg)),
        median: Some(round_one_decimal(median_of_sorted(&sorted))),
        min: sorted.first().copied(),
        max: sorted.last().copied(),
    }
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    let mid = len / 2;
    if len % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Percentage of `count` in `total`, rounded to one decimal. `None` when `total` is zero.
#[allow(clippy::cast_precision_loss)]
pub fn percentage(count: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(round_one_decimal(count as f64 / total as f64 * 100.0))
}

/// Groups `items` by the UTC calendar day (`YYYY-MM-DD`) returned by `day_of`.
///
/// Items without a date are skipped. Keys iterate in ascending date order.
pub fn group_by_date<'a, T, F>(items: &'a [T], day_of: F) -> BTreeMap<String, Vec<&'a T>>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    let mut grouped: BTreeMap<String, Vec<&T>> = BTreeMap::new();
    for item in items {
        if let Some(at) = day_of(item) {
            grouped
                .entry(at.format("%Y-%m-%d").to_string())
                .or_default()
                .push(item);
        }
    }
    grouped
}
