//! Accumulation of streamed history chunks.
//!
//! The history server streams from the most recent data backwards, so every
//! new chunk is older than everything accumulated so far and is prepended.
//! Chunks are disjoint by protocol contract; no overlap de-duplication is
//! attempted.

use serde::Serialize;

use crate::feed::Sample;
use crate::pipeline::{ReducedSeries, ReductionPipeline};

/// Four parallel sequences of equal length, oldest point first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccumulatedSeries {
    timestamps: Vec<i64>,
    speed_up: Vec<f64>,
    speed_down: Vec<f64>,
    combined: Vec<f64>,
}

impl AccumulatedSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn speed_up(&self) -> &[f64] {
        &self.speed_up
    }

    pub fn speed_down(&self) -> &[f64] {
        &self.speed_down
    }

    pub fn combined(&self) -> &[f64] {
        &self.combined
    }

    fn prepend(&mut self, older: ReducedSeries) {
        self.timestamps.splice(0..0, older.timestamps);
        self.speed_up.splice(0..0, older.speed_up);
        self.speed_down.splice(0..0, older.speed_down);
        self.combined.splice(0..0, older.combined);
        debug_assert!(
            self.speed_up.len() == self.len()
                && self.speed_down.len() == self.len()
                && self.combined.len() == self.len()
        );
    }
}

/// Owns the accumulated series for one streaming session.
#[derive(Debug, Clone)]
pub struct StreamMerger {
    pipeline: ReductionPipeline,
    series: AccumulatedSeries,
    chunks_merged: usize,
}

impl StreamMerger {
    pub fn new(pipeline: ReductionPipeline) -> Self {
        Self {
            pipeline,
            series: AccumulatedSeries::default(),
            chunks_merged: 0,
        }
    }

    /// Reduce one raw chunk and prepend the surviving points.
    ///
    /// Returns the number of points added.
    pub fn merge_chunk(&mut self, samples: &[Sample]) -> usize {
        let reduced = self.pipeline.reduce(samples);
        let added = reduced.len();
        self.series.prepend(reduced);
        self.chunks_merged += 1;
        log::debug!(
            "merged chunk {} ({} samples -> {added} points, {} total)",
            self.chunks_merged,
            samples.len(),
            self.series.len()
        );
        added
    }

    /// Drop everything accumulated so far.
    pub fn reset(&mut self) {
        self.series = AccumulatedSeries::default();
        self.chunks_merged = 0;
    }

    pub fn series(&self) -> &AccumulatedSeries {
        &self.series
    }

    pub fn chunks_merged(&self) -> usize {
        self.chunks_merged
    }

    pub fn pipeline(&self) -> &ReductionPipeline {
        &self.pipeline
    }
}
