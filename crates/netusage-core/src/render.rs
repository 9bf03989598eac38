//! Renderer-facing adapter.
//!
//! The pipeline always produces a complete frame. Whether that frame becomes
//! a full redraw or an incremental update is decided here, from an explicit
//! draw state, and never leaks back into the pipeline.

use serde::Serialize;

use crate::merger::AccumulatedSeries;
use crate::pipeline::ReducedSeries;

/// Aligned sequences handed to a chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartFrame {
    pub timestamps: Vec<i64>,
    pub combined: Vec<f64>,
    pub speed_up: Vec<f64>,
    pub speed_down: Vec<f64>,
    /// Only the live view carries a usage trace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_gb: Option<Vec<f64>>,
}

impl ChartFrame {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Latest combined rate, if any.
    pub fn last_combined(&self) -> Option<f64> {
        self.combined.last().copied()
    }
}

impl From<&AccumulatedSeries> for ChartFrame {
    fn from(series: &AccumulatedSeries) -> Self {
        Self {
            timestamps: series.timestamps().to_vec(),
            combined: series.combined().to_vec(),
            speed_up: series.speed_up().to_vec(),
            speed_down: series.speed_down().to_vec(),
            usage_gb: None,
        }
    }
}

impl From<ReducedSeries> for ChartFrame {
    fn from(series: ReducedSeries) -> Self {
        Self {
            timestamps: series.timestamps,
            combined: series.combined,
            speed_up: series.speed_up,
            speed_down: series.speed_down,
            usage_gb: Some(series.usage_gb),
        }
    }
}

/// External chart collaborator.
pub trait Renderer {
    /// Draw from scratch.
    fn replace_all(&mut self, frame: &ChartFrame);
    /// Update an existing drawing in place.
    fn update(&mut self, frame: &ChartFrame);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    Blank,
    Drawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    Full,
    Incremental,
}

pub struct RenderAdapter<R> {
    renderer: R,
    state: DrawState,
}

impl<R: Renderer> RenderAdapter<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            state: DrawState::Blank,
        }
    }

    pub fn present(&mut self, frame: &ChartFrame) -> RenderKind {
        match self.state {
            DrawState::Blank => {
                self.renderer.replace_all(frame);
                self.state = DrawState::Drawn;
                RenderKind::Full
            }
            DrawState::Drawn => {
                self.renderer.update(frame);
                RenderKind::Incremental
            }
        }
    }

    /// Force the next frame to be a full redraw.
    pub fn reset(&mut self) {
        self.state = DrawState::Blank;
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Access the renderer without changing the draw state.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_inner(self) -> R {
        self.renderer
    }
}
