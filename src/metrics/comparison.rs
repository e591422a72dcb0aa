//! Pairwise comparison of two algorithms over the same trials.

use serde::Serialize;

use crate::error::{ExperimentError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseComparison {
    /// Pairs where the candidate (`b`) is lower than the baseline (`a`).
    pub better_count: usize,
    pub worse_count: usize,
    pub equal_count: usize,
    /// Mean of `(b - a) / a * 100` over the pairs that are not equal.
    pub mean_percent_difference: f64,
}

impl PairwiseComparison {
    pub fn compared_count(&self) -> usize {
        self.better_count + self.worse_count + self.equal_count
    }
}

/// Classifies every pair `(a_i, b_i)` of two index-aligned series.
///
/// A pair is dropped from both series when either value is not above `filter_threshold`. Values
/// within `equal_tolerance` relative to `a_i` are equal, otherwise the sign of `b_i - a_i` decides.
pub fn compare(
    series_a: &[f64],
    series_b: &[f64],
    filter_threshold: f64,
    equal_tolerance: f64,
) -> Result<PairwiseComparison> {
    if series_a.len() != series_b.len() {
        return Err(ExperimentError::InvalidArgument(format!(
            "series lengths differ: {} vs {}",
            series_a.len(),
            series_b.len()
        )));
    }
    if !(filter_threshold >= 0.0) {
        return Err(ExperimentError::InvalidArgument(format!(
            "filter threshold must be >= 0, got {}",
            filter_threshold
        )));
    }
    if !(equal_tolerance >= 0.0) {
        return Err(ExperimentError::InvalidArgument(format!(
            "equal tolerance must be >= 0, got {}",
            equal_tolerance
        )));
    }

    let mut comparison = PairwiseComparison {
        better_count: 0,
        worse_count: 0,
        equal_count: 0,
        mean_percent_difference: 0.0,
    };
    let mut difference_sum = 0.0;

    let pairs = series_a
        .iter()
        .zip(series_b.iter())
        .filter(|(a, b)| **a > filter_threshold && **b > filter_threshold);
    for (a, b) in pairs {
        let delta = b - a;
        if delta.abs() <= equal_tolerance * a.abs() {
            comparison.equal_count += 1;
            continue;
        }
        if delta < 0.0 {
            comparison.better_count += 1;
        } else {
            comparison.worse_count += 1;
        }
        difference_sum += delta / a * 100.0;
    }

    let differing = comparison.better_count + comparison.worse_count;
    if differing > 0 {
        comparison.mean_percent_difference = difference_sum / differing as f64;
    }
    Ok(comparison)
}
