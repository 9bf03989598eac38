//! Historical streaming session protocol.
//!
//! ```text
//!   Idle ──request──▶ Requesting ──open──▶ Streaming ──id = -1──▶ Closed
//!     ▲                   │                   │  ▲                   │
//!     └──────close────────┴───────────────────┘  └──chunk (id ≥ 0)   │
//!     └──────────────────────────close───────────────────────────────┘
//! ```
//!
//! At most one request per channel is in flight: a request for the channel
//! that is already requesting or streaming is dropped, not queued. A request
//! for another channel cancels the current session. Every accepted request
//! starts from an empty series.
//!
//! The session is transport-agnostic: callers feed it transport events and
//! send whatever [`StreamSession::on_open`] returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;
use crate::feed::Snapshot;
use crate::merger::{AccumulatedSeries, StreamMerger};
use crate::pipeline::ReductionPipeline;

/// Chunk id marking the end of the stream.
pub const TERMINATOR_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Closed,
}

/// Outbound request, sent once the transport is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub days: u32,
}

/// Inbound stream message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub id: i64,
    #[serde(default)]
    pub data: Option<Value>,
}

impl StreamMessage {
    pub fn chunk(id: i64, data: Value) -> Self {
        Self {
            id,
            data: Some(data),
        }
    }

    pub fn terminator() -> Self {
        Self {
            id: TERMINATOR_ID,
            data: Some(Value::Object(Default::default())),
        }
    }

    pub fn is_terminator(&self) -> bool {
        self.id == TERMINATOR_ID
    }

    /// The chunk payload as a validated snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, FeedError> {
        let data = self.data.as_ref().ok_or(FeedError::MissingData)?;
        Snapshot::from_value(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A fresh session was started.
    Started,
    /// The session streaming for `previous` was cancelled in favour of this one.
    Restarted { previous: String },
    /// A request for this channel is already in flight.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Merged { chunk_id: i64, points: usize },
    /// The terminator arrived; the session is closed.
    Finished,
    /// Malformed message; nothing merged, session keeps streaming.
    Dropped,
    /// Not streaming; message discarded.
    Ignored,
}

/// State machine for one viewer's historical stream.
#[derive(Debug, Clone)]
pub struct StreamSession {
    state: SessionState,
    channel: Option<String>,
    requested_days: u32,
    chunk_index: usize,
    dropped: usize,
    merger: StreamMerger,
}

impl StreamSession {
    pub fn new(pipeline: ReductionPipeline) -> Self {
        Self {
            state: SessionState::Idle,
            channel: None,
            requested_days: 0,
            chunk_index: 0,
            dropped: 0,
            merger: StreamMerger::new(pipeline),
        }
    }

    /// Caller-initiated request for `days` of history on `channel`.
    pub fn request(&mut self, channel: &str, days: u32) -> RequestOutcome {
        if days == 0 {
            log::warn!("ignoring history request for 0 days on {channel}");
            return RequestOutcome::Ignored;
        }

        let previous = if self.is_active() {
            match self.channel.as_deref() {
                Some(current) if current == channel => {
                    log::debug!("history request on {channel} already in flight, dropping");
                    return RequestOutcome::Ignored;
                }
                current => current.map(str::to_string),
            }
        } else {
            None
        };

        self.merger.reset();
        self.state = SessionState::Requesting;
        self.channel = Some(channel.to_string());
        self.requested_days = days;
        self.chunk_index = 0;
        self.dropped = 0;

        match previous {
            Some(previous) => {
                log::info!("cancelled history stream on {previous}, requesting {days}d on {channel}");
                RequestOutcome::Restarted { previous }
            }
            None => {
                log::info!("requesting {days}d of history on {channel}");
                RequestOutcome::Started
            }
        }
    }

    /// Transport connected: returns the request to send, if one is pending.
    pub fn on_open(&mut self) -> Option<HistoryRequest> {
        if self.state != SessionState::Requesting {
            return None;
        }
        self.state = SessionState::Streaming;
        Some(HistoryRequest {
            days: self.requested_days,
        })
    }

    /// Handle one inbound text message.
    pub fn on_message(&mut self, text: &str) -> MessageOutcome {
        if self.state != SessionState::Streaming {
            return MessageOutcome::Ignored;
        }

        let message: StreamMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => return self.drop_message(&FeedError::Json(e)),
        };
        if message.is_terminator() {
            self.state = SessionState::Closed;
            log::info!(
                "history stream finished: {} chunks, {} points, {} dropped",
                self.chunk_index,
                self.merger.series().len(),
                self.dropped
            );
            return MessageOutcome::Finished;
        }

        let snapshot = match message.snapshot() {
            Ok(s) => s,
            Err(e) => return self.drop_message(&e),
        };
        let points = self.merger.merge_chunk(&snapshot.samples());
        self.chunk_index += 1;
        MessageOutcome::Merged {
            chunk_id: message.id,
            points,
        }
    }

    /// Transport closed. Always returns to `Idle`; the series is kept for
    /// display until the next accepted request.
    pub fn on_close(&mut self) {
        if self.state != SessionState::Idle {
            log::debug!("transport closed in state {:?}", self.state);
        }
        self.state = SessionState::Idle;
    }

    fn drop_message(&mut self, err: &FeedError) -> MessageOutcome {
        self.dropped += 1;
        log::warn!("dropping malformed stream message: {err}");
        MessageOutcome::Dropped
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a request is outstanding (requesting or streaming).
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SessionState::Requesting | SessionState::Streaming
        )
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn requested_days(&self) -> u32 {
        self.requested_days
    }

    /// Chunks merged since the current request started.
    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn series(&self) -> &AccumulatedSeries {
        self.merger.series()
    }
}
