//! Tukey fence on downsampled aggregates.
//!
//! Glitched counters occasionally produce runaway or near-zero buckets. The
//! fence `[Q1 - k·IQR, Q3 + k·IQR]` rejects them, and a hard ceiling on the
//! upper bound keeps a single real burst from widening the fence enough to
//! admit the noise it should reject.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub const DEFAULT_IQR_FACTOR: f64 = 1.5;
/// Upper bound ceiling in Mb/s.
pub const DEFAULT_CEILING: f64 = 500.0;
/// Below this many points quartiles are not estimated and everything is kept.
pub const DEFAULT_MIN_POINTS: usize = 4;

/// Fence parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierFence {
    pub factor: f64,
    pub ceiling: f64,
    pub min_points: usize,
}

impl Default for OutlierFence {
    fn default() -> Self {
        Self {
            factor: DEFAULT_IQR_FACTOR,
            ceiling: DEFAULT_CEILING,
            min_points: DEFAULT_MIN_POINTS,
        }
    }
}

/// Inclusive bounds computed for one input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FenceBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl FenceBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Position-based quartiles of an ascending slice.
///
/// When `len / 4` is whole, each quartile is the mean of the two sorted values
/// straddling the rank boundary; otherwise the nearest rank is used
/// (`floor(len/4) + 1` and `ceil(3·len/4) + 1`, 1-indexed, clamped to the last
/// element).
///
/// The whole-quarter case pairs `sorted[k - 1]` with `sorted[k]`, not the
/// 0-indexed `sorted[k]` and `sorted[k + 1]`, which runs past the end for
/// `len == 4`.
pub fn quartiles(sorted: &[f64]) -> Option<(f64, f64)> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let last = n - 1;
    if n % 4 == 0 {
        let k1 = n / 4;
        let k3 = 3 * n / 4;
        let q1 = 0.5 * (sorted[k1 - 1] + sorted[k1]);
        let q3 = 0.5 * (sorted[k3 - 1] + sorted[k3.min(last)]);
        Some((q1, q3))
    } else {
        let q1 = sorted[(n / 4).min(last)];
        let q3 = sorted[(3 * n).div_ceil(4).min(last)];
        Some((q1, q3))
    }
}

impl OutlierFence {
    /// Compute the fence, or `None` when there are too few points.
    pub fn bounds(&self, values: &[f64]) -> Option<FenceBounds> {
        if values.len() < self.min_points.max(1) {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let (q1, q3) = quartiles(&sorted)?;
        let iqr = q3 - q1;
        Some(FenceBounds {
            q1,
            q3,
            lower: q1 - self.factor * iqr,
            upper: (q3 + self.factor * iqr).min(self.ceiling),
        })
    }

    /// Indices of `values` inside the fence, in input order.
    pub fn keep_indices(&self, values: &[f64]) -> Vec<usize> {
        let Some(bounds) = self.bounds(values) else {
            return (0..values.len()).collect();
        };
        let kept: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| bounds.contains(**v))
            .map(|(i, _)| i)
            .collect();
        if kept.len() < values.len() {
            log::debug!(
                "outlier fence [{:.3}, {:.3}] dropped {} of {} points",
                bounds.lower,
                bounds.upper,
                values.len() - kept.len(),
                values.len()
            );
        }
        kept
    }
}
