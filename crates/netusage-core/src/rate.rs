//! Cumulative counters to instantaneous throughput.
//!
//! The rate at index `k` (for `k >= 1`) is the throughput over the interval
//! ending at sample `k`. Index 0 has no preceding interval and copies index 1,
//! so the output always has the same length as the input.
//!
//! A counter that goes backwards (device reboot, counter reset) yields a
//! negative delta. Such an interval is invalid for *both* channels and is
//! replaced by the previous interval's rate, or by the next valid one when
//! there is no previous interval.

use serde::Serialize;

use crate::feed::Sample;

/// Bytes per megabit: byte/s divided by this gives Mb/s.
pub const BYTES_PER_MEGABIT: f64 = 125_000.0;

/// Instantaneous rate at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateSample {
    pub timestamp: i64,
    pub speed_up_mbps: f64,
    pub speed_down_mbps: f64,
    pub total_usage_gb: f64,
}

impl RateSample {
    pub fn combined_mbps(&self) -> f64 {
        self.speed_up_mbps + self.speed_down_mbps
    }
}

/// Rate over the interval `prev -> next`, or `None` if the interval is unusable.
fn interval_rate(prev: &Sample, next: &Sample) -> Option<(f64, f64)> {
    let dt = (next.timestamp - prev.timestamp) as f64;
    if dt <= 0.0 {
        return None;
    }
    let up = (next.upstream_bytes - prev.upstream_bytes) / dt / BYTES_PER_MEGABIT;
    let down = (next.downstream_bytes - prev.downstream_bytes) / dt / BYTES_PER_MEGABIT;
    if up < 0.0 || down < 0.0 || !up.is_finite() || !down.is_finite() {
        return None;
    }
    Some((up, down))
}

/// Derive one [`RateSample`] per input sample, repairing counter anomalies.
pub fn derive_rates(samples: &[Sample]) -> Vec<RateSample> {
    match samples.len() {
        0 => return Vec::new(),
        1 => {
            let s = &samples[0];
            return vec![RateSample {
                timestamp: s.timestamp,
                speed_up_mbps: 0.0,
                speed_down_mbps: 0.0,
                total_usage_gb: s.usage_gb(),
            }];
        }
        _ => {}
    }

    // raw[k] is the interval ending at k; raw[0] is a placeholder.
    let raw: Vec<Option<(f64, f64)>> = std::iter::once(None)
        .chain(samples.windows(2).map(|w| interval_rate(&w[0], &w[1])))
        .collect();

    let mut rates = vec![(0.0, 0.0); samples.len()];
    let mut repaired = 0usize;
    for k in 1..samples.len() {
        rates[k] = match raw[k] {
            Some(rate) => rate,
            None if k >= 2 => {
                repaired += 1;
                rates[k - 1]
            }
            None => {
                repaired += 1;
                raw[k + 1..].iter().flatten().next().copied().unwrap_or((0.0, 0.0))
            }
        };
    }
    rates[0] = rates[1];

    if repaired > 0 {
        log::debug!(
            "repaired {repaired} of {} intervals with counter anomalies",
            samples.len() - 1
        );
    }

    samples
        .iter()
        .zip(rates)
        .map(|(s, (up, down))| RateSample {
            timestamp: s.timestamp,
            speed_up_mbps: up,
            speed_down_mbps: down,
            total_usage_gb: s.usage_gb(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_channel(points: &[(i64, f64)]) -> Vec<Sample> {
        points.iter().map(|&(t, c)| Sample::new(t, 0.0, c)).collect()
    }

    fn down(rates: &[RateSample]) -> Vec<f64> {
        rates.iter().map(|r| r.speed_down_mbps).collect()
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(derive_rates(&[]).is_empty());
        let single = derive_rates(&[Sample::new(5, 1e9, 1e9)]);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].combined_mbps(), 0.0);
        assert!((single[0].total_usage_gb - 2.0).abs() < 1e-12);
    }

    #[test]
    fn output_is_aligned_and_first_copies_second() {
        let rates = derive_rates(&one_channel(&[
            (1000, 0.0),
            (1100, 1_000_000.0),
            (1200, 3_000_000.0),
        ]));
        assert_eq!(rates.len(), 3);
        let d = down(&rates);
        assert!((d[1] - 0.08).abs() < 1e-12);
        assert!((d[2] - 0.16).abs() < 1e-12);
        assert_eq!(d[0], d[1]);
        assert_eq!(rates[2].timestamp, 1200);
    }

    #[test]
    fn irregular_intervals_use_elapsed_time() {
        let rates = derive_rates(&one_channel(&[(0, 0.0), (10, 1_250_000.0), (15, 2_500_000.0)]));
        let d = down(&rates);
        assert!((d[1] - 1.0).abs() < 1e-12);
        assert!((d[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn counter_reset_carries_previous_rate_forward() {
        let samples = vec![
            Sample::new(0, 0.0, 0.0),
            Sample::new(1, 125_000.0, 250_000.0),
            Sample::new(2, 250_000.0, 500_000.0),
            Sample::new(3, 10.0, 750_000.0), // upstream reset
            Sample::new(4, 125_010.0, 1_000_000.0),
        ];
        let rates = derive_rates(&samples);
        // both channels are taken from the previous interval, keeping pairs consistent
        assert_eq!(rates[3].speed_up_mbps, rates[2].speed_up_mbps);
        assert_eq!(rates[3].speed_down_mbps, rates[2].speed_down_mbps);
        assert!((rates[4].speed_up_mbps - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reset_on_first_interval_carries_backward() {
        let rates = derive_rates(&one_channel(&[
            (0, 5_000_000.0),
            (1, 0.0),
            (2, 125_000.0),
            (3, 375_000.0),
        ]));
        let d = down(&rates);
        assert!((d[1] - 1.0).abs() < 1e-12);
        assert_eq!(d[1], d[2]);
        assert_eq!(d[0], d[1]);
    }

    #[test]
    fn consecutive_resets_reuse_the_repaired_value() {
        let rates = derive_rates(&one_channel(&[
            (0, 0.0),
            (1, 125_000.0),
            (2, 100.0),
            (3, 50.0),
        ]));
        let d = down(&rates);
        assert_eq!(d[2], d[1]);
        assert_eq!(d[3], d[1]);
        assert!(d.iter().all(|r| *r >= 0.0));
    }

    #[test]
    fn all_intervals_invalid_degrades_to_zero() {
        let rates = derive_rates(&one_channel(&[(0, 10.0), (1, 5.0), (2, 1.0)]));
        assert!(down(&rates).iter().all(|r| *r == 0.0));
    }

    #[test]
    fn non_increasing_timestamps_are_invalid_intervals() {
        let samples = vec![
            Sample::new(0, 0.0, 0.0),
            Sample::new(1, 0.0, 125_000.0),
            Sample::new(1, 0.0, 900_000.0),
        ];
        let rates = derive_rates(&samples);
        assert_eq!(rates[2].speed_down_mbps, rates[1].speed_down_mbps);
    }
}
