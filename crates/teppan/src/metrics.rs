//! Latency summaries.
//!
//! Percentiles use the nearest-rank rule on the ascending-sorted samples:
//! the `p`-th percentile is the value at zero-based index
//! `floor(p × (n − 1))`. For `[10, 20, 30, 40, 50]` that gives p50 = 30,
//! p90 = 40 (index 3) and p99 = 40 (index 3).

use std::time::Duration;
use serde::Serialize;
use crate::error::MetricsError;

/// Summary statistics over one run's samples, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub total: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Summarizes `samples` (milliseconds, any order).
///
/// # Errors
///
/// [`MetricsError::NoSamples`] for an empty slice.
pub fn summarize(samples: &[f64]) -> Result<LatencySummary, MetricsError> {
    if samples.is_empty() {
        return Err(MetricsError::NoSamples);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let total: f64 = sorted.iter().sum();
    Ok(LatencySummary {
        count: sorted.len(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        mean: total / sorted.len() as f64,
        total,
        p50: percentile(&sorted, 0.50),
        p90: percentile(&sorted, 0.90),
        p99: percentile(&sorted, 0.99),
    })
}

/// Nearest-rank percentile of an ascending, non-empty slice. `p` is a
/// fraction in `[0, 1]`; out-of-range values are clamped.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let last = sorted.len().saturating_sub(1);
    let index = (p.clamp(0.0, 1.0) * last as f64).floor() as usize;
    sorted[index.min(last)]
}

/// An ordered set of latency samples collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LatencySamples(Vec<f64>);

impl LatencySamples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Duration) {
        self.0.push(crate::time::millis(sample));
    }

    pub fn push_ms(&mut self, ms: f64) {
        self.0.push(ms);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_millis(&self) -> &[f64] {
        &self.0
    }

    pub fn summarize(&self) -> Result<LatencySummary, MetricsError> {
        summarize(&self.0)
    }
}

impl FromIterator<Duration> for LatencySamples {
    fn from_iter<I: IntoIterator<Item = Duration>>(iter: I) -> Self {
        Self(iter.into_iter().map(crate::time::millis).collect())
    }
}

impl From<Vec<f64>> for LatencySamples {
    fn from(ms: Vec<f64>) -> Self {
        Self(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_samples() {
        let summary = summarize(&[10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();
        assert_eq!(summary, LatencySummary {
            count: 5,
            min: 10.0,
            max: 50.0,
            mean: 30.0,
            total: 150.0,
            p50: 30.0,
            p90: 40.0,
            p99: 40.0,
        });
    }

    #[test]
    fn test_nearest_rank_table() {
        // (n, p, expected) for samples 1..=n
        let table = [
            (1, 0.50, 1.0),
            (1, 0.99, 1.0),
            (2, 0.50, 1.0),
            (2, 0.99, 1.0),
            (4, 0.50, 2.0),
            (4, 0.90, 3.0),
            (10, 0.50, 5.0),
            (10, 0.90, 9.0),
            (10, 0.99, 9.0),
            (100, 0.50, 50.0),
            (100, 0.90, 90.0),
            (100, 0.99, 99.0),
        ];
        for (n, p, expected) in table {
            let sorted = (1..=n).map(|v| v as f64).collect::<Vec<_>>();
            assert_eq!(percentile(&sorted, p), expected, "n={n} p={p}");
        }
    }

    #[test]
    fn test_percentile_clamps_p() {
        let sorted = [1.0, 2.0, 3.0];
        assert_eq!(percentile(&sorted, -1.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 3.0);
        assert_eq!(percentile(&sorted, 7.0), 3.0);
    }

    #[test]
    fn test_unsorted_input() {
        let summary = summarize(&[50.0, 10.0, 40.0, 20.0, 30.0]).unwrap();
        assert_eq!(summary.p50, 30.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 50.0);
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(summarize(&[]), Err(MetricsError::NoSamples));
        assert_eq!(LatencySamples::new().summarize(), Err(MetricsError::NoSamples));
    }

    #[test]
    fn test_samples_from_durations() {
        let samples: LatencySamples = [Duration::from_millis(3), Duration::from_micros(1500)]
            .into_iter()
            .collect();
        assert_eq!(samples.as_millis(), &[3.0, 1.5]);

        let mut samples = samples;
        samples.push(Duration::from_millis(6));
        samples.push_ms(1.5);
        let summary = samples.summarize().unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.total, 12.0);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.p50, 1.5);
    }
}
