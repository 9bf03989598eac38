//! Fixed-size bucket averaging.
//!
//! Consecutive runs of exactly `n` rate samples collapse into one point. A
//! trailing run shorter than `n` is dropped rather than averaged over fewer
//! samples, and an input shorter than `n` yields no buckets at all.

use serde::Serialize;

use crate::rate::RateSample;

/// One downsampled point, left-aligned on its window's first sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub timestamp: i64,
    pub avg_speed_up: f64,
    pub avg_speed_down: f64,
    /// Usage at the window's first sample, aligned with `timestamp`.
    pub usage_gb: f64,
}

impl Bucket {
    /// Sum of both channel means.
    pub fn combined(&self) -> f64 {
        self.avg_speed_up + self.avg_speed_down
    }
}

/// Average `rates` into buckets of `bucket_size` samples (`0` is treated as `1`).
pub fn downsample(rates: &[RateSample], bucket_size: usize) -> Vec<Bucket> {
    let n = bucket_size.max(1);
    rates
        .chunks_exact(n)
        .map(|window| {
            let len = window.len() as f64;
            let (up, down) = window.iter().fold((0.0, 0.0), |(u, d), r| {
                (u + r.speed_up_mbps, d + r.speed_down_mbps)
            });
            Bucket {
                timestamp: window[0].timestamp,
                avg_speed_up: up / len,
                avg_speed_down: down / len,
                usage_gb: window[0].total_usage_gb,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(values: &[(f64, f64)]) -> Vec<RateSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &(up, down))| RateSample {
                timestamp: 100 + i as i64 * 10,
                speed_up_mbps: up,
                speed_down_mbps: down,
                total_usage_gb: i as f64,
            })
            .collect()
    }

    #[test]
    fn bucket_count_is_floor_of_length_over_size() {
        let input = rates(&[(1.0, 1.0); 10]);
        assert_eq!(downsample(&input, 3).len(), 3);
        assert_eq!(downsample(&input, 5).len(), 2);
        assert_eq!(downsample(&input, 10).len(), 1);
        assert_eq!(downsample(&input, 1).len(), 10);
    }

    #[test]
    fn shorter_than_bucket_is_empty() {
        assert!(downsample(&rates(&[(1.0, 2.0); 4]), 5).is_empty());
        assert!(downsample(&[], 3).is_empty());
    }

    #[test]
    fn values_are_window_means_left_aligned() {
        let input = rates(&[(1.0, 10.0), (2.0, 20.0), (3.0, 30.0), (4.0, 40.0), (9.0, 9.0)]);
        let buckets = downsample(&input, 2);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].timestamp, 100);
        assert_eq!(buckets[1].timestamp, 120);
        assert!((buckets[0].avg_speed_up - 1.5).abs() < 1e-9);
        assert!((buckets[0].avg_speed_down - 15.0).abs() < 1e-9);
        assert!((buckets[1].combined() - 38.5).abs() < 1e-9);
        assert_eq!(buckets[1].usage_gb, 2.0);
    }

    #[test]
    fn zero_bucket_size_behaves_like_one() {
        let input = rates(&[(1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(downsample(&input, 0), downsample(&input, 1));
    }
}
