pub mod history;
pub mod reduce;
pub mod serve;
pub mod watch;

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Local};
use netusage_core::{PipelineConfig, ReductionPipeline};

/// Resolve the pipeline config: file if given, else `base`, then the bucket
/// size override.
pub fn load_pipeline(
    config_path: Option<&str>,
    bucket_size: Option<usize>,
    base: PipelineConfig,
) -> anyhow::Result<ReductionPipeline> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::load(Path::new(path))
            .with_context(|| format!("loading pipeline config {path}"))?,
        None => base,
    };
    if let Some(size) = bucket_size {
        config = config.with_bucket_size(size);
    }
    config.validate()?;
    Ok(ReductionPipeline::new(config))
}

/// Local `MM-DD HH:MM:SS` of a unix timestamp; out-of-range values print raw.
pub fn format_clock(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%m-%d %H:%M:%S")
            .to_string(),
        None => ts.to_string(),
    }
}

pub fn format_mbps(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gb/s", mbps / 1000.0)
    } else if mbps >= 1.0 {
        format!("{mbps:.2} Mb/s")
    } else {
        format!("{:.1} kb/s", mbps * 1000.0)
    }
}
