use std::time::Duration;

use anyhow::Context;
use netusage_core::{
    DEFAULT_POLL_INTERVAL, FeedError, FileSnapshotSource, LiveView, PipelineConfig, PollReporter,
    RenderAdapter, run_poll_loop,
};
use ratatui::backend::Backend;
use tokio_util::sync::CancellationToken;

use crate::tui::{self, ChartRenderer};

pub struct WatchCommandConfig<'a> {
    pub path: &'a str,
    pub interval_secs: f64,
    pub config_path: Option<&'a str>,
    pub show_devices: bool,
}

/// Charts every polled view through a [`RenderAdapter`].
struct WatchReporter<B: Backend> {
    adapter: RenderAdapter<ChartRenderer<B>>,
    show_devices: bool,
    failing: bool,
}

impl<B: Backend> WatchReporter<B> {
    fn new(renderer: ChartRenderer<B>, show_devices: bool) -> Self {
        Self {
            adapter: RenderAdapter::new(renderer),
            show_devices,
            failing: false,
        }
    }
}

impl<B: Backend> PollReporter for WatchReporter<B> {
    fn on_view(&mut self, view: &LiveView) {
        if self.failing {
            // the feed came back; start a fresh chart
            self.adapter.reset();
            self.failing = false;
        }
        let chart = self.adapter.renderer_mut();
        chart.set_notice(
            (view.skipped > 0).then(|| format!("{} malformed entries skipped", view.skipped)),
        );
        if self.show_devices {
            chart.set_devices(view.devices.clone());
        }
        self.adapter.present(&view.frame);
    }

    fn on_error(&mut self, err: &FeedError) {
        if !self.failing {
            log::debug!("feed unavailable: {err}");
        }
        self.failing = true;
        let chart = self.adapter.renderer_mut();
        chart.set_notice(Some(format!("feed unavailable: {err}")));
        chart.redraw();
    }
}

fn poll_interval(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or(DEFAULT_POLL_INTERVAL)
}

pub fn run(cfg: WatchCommandConfig) -> anyhow::Result<()> {
    let pipeline = super::load_pipeline(cfg.config_path, None, PipelineConfig::live())?;
    let interval = poll_interval(cfg.interval_secs);
    let title = format!("{} every {:.1}s", cfg.path, interval.as_secs_f64());

    let rt = tokio::runtime::Runtime::new()?;
    let (terminal, guard) = tui::enter().context("starting terminal UI")?;
    let stats = rt.block_on(async {
        let cancel = CancellationToken::new();
        let keys = tui::spawn_quit_listener(cancel.clone());

        let mut source = FileSnapshotSource::new(cfg.path);
        let mut reporter = WatchReporter::new(ChartRenderer::new(terminal, title), cfg.show_devices);
        reporter.adapter.renderer_mut().redraw();
        let stats = run_poll_loop(&mut source, &pipeline, interval, &mut reporter, cancel.clone()).await;

        cancel.cancel();
        let _ = keys.await;
        stats
    });
    drop(guard);

    println!("{} polls, {} failed", stats.ticks, stats.failures);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netusage_core::{DeviceReading, DrawState, ReductionPipeline, Sample, Snapshot};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn view() -> LiveView {
        let snapshot = Snapshot::from_samples(&[
            Sample::new(0, 0.0, 0.0),
            Sample::new(10, 1_250_000.0, 2_500_000.0),
        ]);
        LiveView::from_snapshot(&snapshot, &ReductionPipeline::live())
    }

    fn reporter(show_devices: bool) -> WatchReporter<TestBackend> {
        let terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        WatchReporter::new(ChartRenderer::new(terminal, "df.json"), show_devices)
    }

    #[test]
    fn test_poll_interval_falls_back() {
        assert_eq!(poll_interval(2.5), Duration::from_millis(2500));
        assert_eq!(poll_interval(0.0), DEFAULT_POLL_INTERVAL);
        assert_eq!(poll_interval(-1.0), DEFAULT_POLL_INTERVAL);
        assert_eq!(poll_interval(f64::NAN), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_reporter_redraws_after_outage() {
        let mut reporter = reporter(false);
        reporter.on_view(&view());
        assert_eq!(reporter.adapter.state(), DrawState::Drawn);

        reporter.on_error(&FeedError::MissingData);
        reporter.on_error(&FeedError::MissingData);
        assert!(reporter.failing);
        let chart = reporter.adapter.renderer();
        assert!(chart.screen().contains("feed unavailable"));

        reporter.on_view(&view());
        assert!(!reporter.failing);
        let chart = reporter.adapter.renderer();
        // one fresh draw per healthy stretch, plus the outage redraws
        assert_eq!(chart.counts(), (2, 4));
        assert!(chart.view().notice.is_none());
        assert!(!chart.screen().contains("feed unavailable"));
    }

    #[test]
    fn test_reporter_devices_and_skip_notice() {
        let mut noisy = view();
        noisy.skipped = 2;
        noisy.devices = vec![DeviceReading {
            room: "1A".into(),
            mac: "00:11:22:33:44:55".into(),
            number: "7".into(),
            us_power: Some(42.0),
            ds_power: Some(3.1),
            us_snr: Some(35.5),
            ds_snr: Some(38.1),
            usage_gb: 1.25,
        }];

        let mut quiet = reporter(false);
        quiet.on_view(&noisy);
        let chart = quiet.adapter.renderer();
        assert!(chart.view().devices.is_empty());
        assert!(chart.screen().contains("2 malformed entries skipped"));

        let mut detailed = reporter(true);
        detailed.on_view(&noisy);
        assert!(detailed.adapter.renderer().screen().contains("00:11:22:33:44:55"));

        // a clean view clears the notice
        detailed.on_view(&view());
        assert!(detailed.adapter.renderer().view().notice.is_none());
    }
}
