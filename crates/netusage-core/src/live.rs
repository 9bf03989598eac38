//! Live view built from one polled snapshot.

use serde::Serialize;

use crate::feed::{DeviceReading, Snapshot};
use crate::pipeline::ReductionPipeline;
use crate::render::ChartFrame;

#[derive(Debug, Clone, Serialize)]
pub struct LiveView {
    pub frame: ChartFrame,
    /// Device table of the latest entry.
    pub devices: Vec<DeviceReading>,
    pub latest_timestamp: Option<i64>,
    pub latest_usage_gb: f64,
    /// Entries rejected while parsing the snapshot.
    pub skipped: usize,
}

impl LiveView {
    pub fn from_snapshot(snapshot: &Snapshot, pipeline: &ReductionPipeline) -> Self {
        Self {
            frame: ChartFrame::from(pipeline.reduce_snapshot(snapshot)),
            devices: snapshot.devices(),
            latest_timestamp: snapshot.last_timestamp(),
            latest_usage_gb: snapshot.latest_usage_gb(),
            skipped: snapshot.skipped(),
        }
    }

    /// Most recent (up, down) rate in Mb/s.
    pub fn current_rates(&self) -> Option<(f64, f64)> {
        let up = self.frame.speed_up.last()?;
        let down = self.frame.speed_down.last()?;
        Some((*up, *down))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn live_view_from_snapshot() {
        let snapshot = Snapshot::from_value(&json!({
            "100": {"Us Bytes": [0, 0], "Ds Bytes": [0, 0]},
            "101": {"Us Bytes": [62_500, 62_500], "Ds Bytes": [250_000, 0]},
            "102": {
                "Us Bytes": [125_000, 125_000],
                "Ds Bytes": [500_000, 0],
                "Room": ["1A", "1B"],
                "MAC": ["m1", "m2"]
            },
            "bogus": {}
        }))
        .unwrap();

        let view = LiveView::from_snapshot(&snapshot, &ReductionPipeline::live());
        assert_eq!(view.frame.len(), 3);
        assert_eq!(view.frame.usage_gb.as_ref().map(Vec::len), Some(3));
        assert_eq!(view.latest_timestamp, Some(102));
        assert_eq!(view.devices.len(), 2);
        assert_eq!(view.skipped, 1);

        let (up, down) = view.current_rates().unwrap();
        assert!((up - 1.0).abs() < 1e-12);
        assert!((down - 2.0).abs() < 1e-12);
        assert!((view.latest_usage_gb - 750_000.0 / 1e9).abs() < 1e-15);
    }

    #[test]
    fn empty_snapshot_has_no_rates() {
        let view = LiveView::from_snapshot(&Snapshot::default(), &ReductionPipeline::live());
        assert!(view.frame.is_empty());
        assert_eq!(view.current_rates(), None);
        assert!(view.devices.is_empty());
    }
}
