//! The reduction pipeline: rates → buckets → outlier fence.
//!
//! Live snapshots and streamed history chunks go through the same code path
//! with different [`PipelineConfig`]s.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::downsample::{Bucket, downsample};
use crate::feed::{Sample, Snapshot};
use crate::rate::derive_rates;

/// Aligned, renderer-ready sequences.
///
/// All five vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducedSeries {
    pub timestamps: Vec<i64>,
    pub combined: Vec<f64>,
    pub speed_up: Vec<f64>,
    pub speed_down: Vec<f64>,
    pub usage_gb: Vec<f64>,
}

impl ReducedSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn push(&mut self, bucket: &Bucket) {
        self.timestamps.push(bucket.timestamp);
        self.combined.push(bucket.combined());
        self.speed_up.push(bucket.avg_speed_up);
        self.speed_down.push(bucket.avg_speed_down);
        self.usage_gb.push(bucket.usage_gb);
    }
}

/// One configured reduction.
#[derive(Debug, Clone)]
pub struct ReductionPipeline {
    config: PipelineConfig,
}

impl ReductionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn live() -> Self {
        Self::new(PipelineConfig::live())
    }

    pub fn history() -> Self {
        Self::new(PipelineConfig::history())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn reduce(&self, samples: &[Sample]) -> ReducedSeries {
        let rates = derive_rates(samples);
        let buckets = downsample(&rates, self.config.bucket_size);

        let mut series = ReducedSeries::default();
        if self.config.filter_outliers {
            let combined: Vec<f64> = buckets.iter().map(Bucket::combined).collect();
            for i in self.config.fence().keep_indices(&combined) {
                series.push(&buckets[i]);
            }
        } else {
            buckets.iter().for_each(|b| series.push(b));
        }
        series
    }

    pub fn reduce_snapshot(&self, snapshot: &Snapshot) -> ReducedSeries {
        self.reduce(&snapshot.samples())
    }
}
