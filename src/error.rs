//! Error types for streamsync.

use thiserror::Error;

use crate::model::{EventId, StreamId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid stream handle: {0}")]
    InvalidStream(StreamId),

    #[error("invalid event handle: {0}")]
    InvalidEvent(EventId),

    /// A wait was requested on a sequence number the stream has not enqueued.
    #[error("sequence {requested} never enqueued on stream {stream} (tail {tail})")]
    NeverReached {
        stream: StreamId,
        requested: u64,
        tail: u64,
    },

    #[error("context has been shut down")]
    Closed,

    #[error("event {0} has never been recorded")]
    Unrecorded(EventId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the handle errors (destroyed or never-created stream/event).
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Error::InvalidStream(_) | Error::InvalidEvent(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
