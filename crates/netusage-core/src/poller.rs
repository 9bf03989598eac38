//! Supervised live poll loop.
//!
//! Each tick fetches a snapshot, reduces it into a [`LiveView`] and hands it to
//! the reporter. A failed tick is reported and the loop carries on after the
//! usual delay; only cancellation stops it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::FeedError;
use crate::feed::Snapshot;
use crate::live::LiveView;
use crate::pipeline::ReductionPipeline;

/// Default delay between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where snapshots come from.
pub trait SnapshotSource {
    fn fetch(&mut self) -> impl Future<Output = Result<Snapshot, FeedError>> + Send;
}

/// Snapshot JSON file rewritten by the collector on every tick.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for FileSnapshotSource {
    /// The file read and parse run on the blocking pool.
    async fn fetch(&mut self) -> Result<Snapshot, FeedError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Snapshot::load(&path))
            .await
            .map_err(|e| FeedError::io(&self.path, std::io::Error::other(e)))?
    }
}

/// Observer for poll outcomes.
pub trait PollReporter {
    fn on_view(&mut self, view: &LiveView);
    fn on_error(&mut self, err: &FeedError);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub failures: u64,
}

/// Poll until `cancel` fires.
pub async fn run_poll_loop<S, R>(
    source: &mut S,
    pipeline: &ReductionPipeline,
    interval: Duration,
    reporter: &mut R,
    cancel: CancellationToken,
) -> PollStats
where
    S: SnapshotSource,
    R: PollReporter,
{
    let mut stats = PollStats::default();
    while !cancel.is_cancelled() {
        stats.ticks += 1;
        match source.fetch().await {
            Ok(snapshot) => reporter.on_view(&LiveView::from_snapshot(&snapshot, pipeline)),
            Err(e) => {
                stats.failures += 1;
                log::warn!("poll tick {} failed: {e}", stats.ticks);
                reporter.on_error(&e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    log::info!(
        "poll loop stopped after {} ticks ({} failed)",
        stats.ticks,
        stats.failures
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Sample;

    /// Fails on every odd tick.
    struct Flaky {
        calls: usize,
    }

    impl SnapshotSource for Flaky {
        async fn fetch(&mut self) -> Result<Snapshot, FeedError> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                return Err(FeedError::MissingData);
            }
            Ok(Snapshot::from_samples(&[
                Sample::new(0, 0.0, 0.0),
                Sample::new(1, 125_000.0, 0.0),
            ]))
        }
    }

    struct StopAfter {
        views: usize,
        errors: usize,
        limit: usize,
        cancel: CancellationToken,
    }

    impl PollReporter for StopAfter {
        fn on_view(&mut self, view: &LiveView) {
            assert_eq!(view.frame.len(), 2);
            self.views += 1;
            if self.views >= self.limit {
                self.cancel.cancel();
            }
        }
        fn on_error(&mut self, _err: &FeedError) {
            self.errors += 1;
        }
    }

    #[tokio::test]
    async fn errors_are_reported_and_loop_continues() {
        let cancel = CancellationToken::new();
        let mut reporter = StopAfter {
            views: 0,
            errors: 0,
            limit: 3,
            cancel: cancel.clone(),
        };
        let stats = run_poll_loop(
            &mut Flaky { calls: 0 },
            &ReductionPipeline::live(),
            Duration::from_millis(1),
            &mut reporter,
            cancel,
        )
        .await;
        assert_eq!(reporter.views, 3);
        assert_eq!(reporter.errors, 3);
        assert_eq!(stats, PollStats { ticks: 6, failures: 3 });
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_tick() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut reporter = StopAfter {
            views: 0,
            errors: 0,
            limit: 1,
            cancel: cancel.clone(),
        };
        let stats = run_poll_loop(
            &mut Flaky { calls: 0 },
            &ReductionPipeline::live(),
            Duration::from_secs(60),
            &mut reporter,
            cancel,
        )
        .await;
        assert_eq!(stats.ticks, 0);
    }

    #[tokio::test]
    async fn file_source_reads_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("df.json");
        std::fs::write(&path, r#"{"1": {"Us Bytes": [1], "Ds Bytes": [1]}}"#).unwrap();
        let mut source = FileSnapshotSource::new(&path);
        assert_eq!(source.fetch().await.unwrap().len(), 1);
        std::fs::remove_file(&path).unwrap();
        assert!(source.fetch().await.is_err());
    }

    struct Collect {
        views: Vec<usize>,
        cancel: CancellationToken,
    }

    impl PollReporter for Collect {
        fn on_view(&mut self, view: &LiveView) {
            self.views.push(view.frame.len());
            self.cancel.cancel();
        }
        fn on_error(&mut self, _err: &FeedError) {}
    }

    #[tokio::test]
    async fn file_source_polls_on_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("df.json");
        std::fs::write(
            &path,
            r#"{"1": {"Us Bytes": [0], "Ds Bytes": [0]}, "2": {"Us Bytes": [125000], "Ds Bytes": [0]}}"#,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let mut reporter = Collect {
            views: Vec::new(),
            cancel: cancel.clone(),
        };
        let stats = run_poll_loop(
            &mut FileSnapshotSource::new(&path),
            &ReductionPipeline::live(),
            Duration::from_secs(60),
            &mut reporter,
            cancel,
        )
        .await;
        assert_eq!(reporter.views, vec![2]);
        assert_eq!(stats, PollStats { ticks: 1, failures: 0 });
    }
}
