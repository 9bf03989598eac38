//! # netusage-core
//!
//! **Cumulative modem counters in, stable chart series out.**
//!
//! The collector samples per-device upstream/downstream byte totals at
//! irregular intervals. This crate turns those totals into throughput series
//! that stay readable on a live chart:
//!
//! ```no_run
//! use netusage_core::{ReductionPipeline, Snapshot};
//!
//! let snapshot = Snapshot::load("files/df.json".as_ref()).unwrap();
//! let series = ReductionPipeline::history().reduce_snapshot(&snapshot);
//! println!("{} points, last {:?} Mb/s", series.len(), series.combined.last());
//! ```
//!
//! ## Architecture
//!
//! Snapshot → rates → buckets → outlier fence → (merge) → renderer
//!
//! - [`rate`]: counter deltas over elapsed time, with reset repair
//! - [`downsample`]: fixed-size bucket means, trailing remainder dropped
//! - [`outlier`]: Tukey fence with a hard ceiling
//! - [`merger`]: prepends streamed history chunks into one series
//! - [`session`]: the one-request-at-a-time streaming protocol
//!
//! Live snapshots are polled by [`poller`]; historical chunks are served from
//! an [`archive`] and merged by a [`StreamSession`].

pub mod archive;
pub mod config;
pub mod downsample;
pub mod error;
pub mod feed;
pub mod live;
pub mod merger;
pub mod outlier;
pub mod pipeline;
pub mod poller;
pub mod rate;
pub mod render;
pub mod session;

pub use archive::{ArchiveChunks, HistoryArchive};
pub use config::{HISTORY_BUCKET_SIZE, PipelineConfig};
pub use downsample::{Bucket, downsample};
pub use error::{ConfigError, FeedError};
pub use feed::{BYTES_PER_GIGABYTE, DeviceReading, FeedEntry, Sample, Snapshot};
pub use live::LiveView;
pub use merger::{AccumulatedSeries, StreamMerger};
pub use outlier::{FenceBounds, OutlierFence, quartiles};
pub use pipeline::{ReducedSeries, ReductionPipeline};
pub use poller::{
    DEFAULT_POLL_INTERVAL, FileSnapshotSource, PollReporter, PollStats, SnapshotSource,
    run_poll_loop,
};
pub use rate::{BYTES_PER_MEGABIT, RateSample, derive_rates};
pub use render::{ChartFrame, DrawState, RenderAdapter, RenderKind, Renderer};
pub use session::{
    HistoryRequest, MessageOutcome, RequestOutcome, SessionState, StreamMessage, StreamSession,
    TERMINATOR_ID,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
