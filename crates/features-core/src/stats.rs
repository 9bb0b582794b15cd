//! Descriptive statistics over the non-null observations of one group.
//!
//! Every helper returns `None` where the statistic is undefined; the
//! aggregator turns those into [`crate::features::MISSING_SENTINEL`].

use std::collections::HashSet;
use std::hash::Hash;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator).
///
/// Undefined for fewer than two observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() as f64 - 1.0)).sqrt())
}

/// Median of a **sorted** slice; the mean of the two middle values when the
/// length is even.
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// `max - min`; an empty slice spans nothing and yields `0.0`.
pub fn range(values: &[f64]) -> f64 {
    let mut iter = values.iter().copied();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let (lo, hi) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    hi - lo
}

/// Number of distinct non-null values.
pub fn count_distinct<'a, T, I>(values: I) -> usize
where
    T: Eq + Hash + ?Sized + 'a,
    I: IntoIterator<Item = Option<&'a T>>,
{
    values.into_iter().flatten().collect::<HashSet<_>>().len()
}

/// Most frequent value of a 0/1 indicator observed `total` times with
/// `hits` ones.
///
/// The mode is `1.0` only when `hits > misses`; a tie resolves to `0.0`.
/// `None` when nothing was observed.
pub fn indicator_mode(hits: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let misses = total - hits.min(total);
    if hits > misses {
        Some(1.0)
    } else {
        Some(0.0)
    }
}

/// Summary of one numerical column within one group.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub sum: f64,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub median: Option<f64>,
    pub range: f64,
}

impl NumericSummary {
    /// Summarise the observations of one group; nulls must already be
    /// filtered out.
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            sum: values.iter().sum(),
            mean: mean(values),
            std: sample_std(values),
            median: median_sorted(&sorted),
            range: range(&sorted),
        }
    }
}
