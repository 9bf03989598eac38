use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use netusage_core::{PipelineConfig, ReducedSeries, Snapshot};

use super::{format_clock, format_mbps};

pub struct ReduceCommandConfig<'a> {
    pub path: &'a str,
    pub bucket_size: Option<usize>,
    pub filter_outliers: bool,
    pub config_path: Option<&'a str>,
    pub format: &'a str,
    pub output_path: Option<&'a str>,
}

fn render_table(series: &ReducedSeries) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<14} {:>12} {:>12} {:>12} {:>10}",
        "Time", "Up", "Down", "Total", "Used GB"
    );
    let _ = writeln!(out, "{}", "─".repeat(64));
    for i in 0..series.len() {
        let _ = writeln!(
            out,
            "{:<14} {:>12} {:>12} {:>12} {:>10.2}",
            format_clock(series.timestamps[i]),
            format_mbps(series.speed_up[i]),
            format_mbps(series.speed_down[i]),
            format_mbps(series.combined[i]),
            series.usage_gb[i],
        );
    }
    out
}

pub fn run(cfg: ReduceCommandConfig) -> anyhow::Result<()> {
    let snapshot = Snapshot::load(Path::new(cfg.path))?;
    let mut pipeline_cfg = match cfg.config_path {
        Some(path) => PipelineConfig::load(Path::new(path))
            .with_context(|| format!("loading pipeline config {path}"))?,
        None => PipelineConfig::history(),
    };
    if !cfg.filter_outliers {
        pipeline_cfg.filter_outliers = false;
    }
    let pipeline = super::load_pipeline(None, cfg.bucket_size, pipeline_cfg)?;
    let series = pipeline.reduce_snapshot(&snapshot);

    log::info!(
        "{}: {} entries ({} skipped) reduced to {} points",
        cfg.path,
        snapshot.len(),
        snapshot.skipped(),
        series.len()
    );

    let text = match cfg.format {
        "json" => serde_json::to_string_pretty(&series)?,
        _ => render_table(&series),
    };
    match cfg.output_path {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("writing {path}"))?;
            println!("{} points written to {path}", series.len());
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netusage_core::{ReductionPipeline, Sample};

    fn write_snapshot(dir: &Path) -> String {
        let samples: Vec<Sample> = (0..20)
            .map(|i| Sample::new(i, i as f64 * 125_000.0, i as f64 * 250_000.0))
            .collect();
        let path = dir.join("df.json");
        std::fs::write(&path, Snapshot::from_samples(&samples).to_counter_value().to_string())
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_table_has_row_per_point() {
        let samples: Vec<Sample> = (0..6)
            .map(|i| Sample::new(i, i as f64 * 125_000.0, 0.0))
            .collect();
        let series = ReductionPipeline::live().reduce(&samples);
        let table = render_table(&series);
        assert_eq!(table.lines().count(), 2 + 6);
        assert!(table.lines().nth(2).unwrap().starts_with(&format_clock(0)));
        assert!(table.contains("1.00 Mb/s"));
    }

    #[test]
    fn test_run_writes_json_series() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_snapshot(dir.path());
        let output = dir.path().join("series.json");
        run(ReduceCommandConfig {
            path: &input,
            bucket_size: Some(5),
            filter_outliers: false,
            config_path: None,
            format: "json",
            output_path: output.to_str(),
        })
        .unwrap();

        let series: ReducedSeries =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.timestamps, vec![0, 5, 10, 15]);
        assert!(series.combined.iter().all(|c| (c - 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_run_missing_file_fails() {
        let result = run(ReduceCommandConfig {
            path: "/nonexistent/df.json",
            bucket_size: None,
            filter_outliers: true,
            config_path: None,
            format: "table",
            output_path: None,
        });
        assert!(result.is_err());
    }
}
