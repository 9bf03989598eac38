//! Boundary error types.
//!
//! Only failures at the edges of the pipeline are errors: an unreadable file,
//! a payload that is not JSON, a config that cannot be honoured. Counter
//! anomalies and short inputs are repaired or degraded silently and never
//! show up here.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn raw feed bytes into a [`Snapshot`](crate::feed::Snapshot).
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object keyed by timestamp, found {found}")]
    NotAnObject { found: &'static str },

    #[error("stream message has no `data` field")]
    MissingData,
}

impl FeedError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Invalid or unreadable pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bucket_size must be at least 1")]
    ZeroBucketSize,

    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidFactor { field: &'static str, value: f64 },
}
