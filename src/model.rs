//! Core data model.
//!
//! Streams and events are addressed by opaque handles. A work unit is a
//! positioned, opaque action in exactly one stream's timeline.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle for a stream. Stays meaningful as an identifier after the
/// stream is destroyed; operations on it then fail with `InvalidStream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream-{}", &self.0.to_string()[..8])
    }
}

/// Handle for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event-{}", &self.0.to_string()[..8])
    }
}

// ---------------------------------------------------------------------------
// Query status
// ---------------------------------------------------------------------------

/// Result of a non-blocking completion check. `NotReady` is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Ready,
    NotReady,
}

impl QueryStatus {
    pub fn is_ready(self) -> bool {
        self == QueryStatus::Ready
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Ready => "ready",
            QueryStatus::NotReady => "not_ready",
        }
    }
}

impl From<bool> for QueryStatus {
    fn from(done: bool) -> Self {
        if done {
            QueryStatus::Ready
        } else {
            QueryStatus::NotReady
        }
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Work units
// ---------------------------------------------------------------------------

/// Completion timestamp slot written once by the lane that runs a marker.
pub type Stamp = Arc<OnceLock<DateTime<Utc>>>;

/// What a work unit does when its lane reaches it.
pub enum Payload {
    /// Caller-supplied opaque effect.
    Task(Box<dyn FnOnce() + Send + 'static>),
    /// Event record marker. Has no effect beyond stamping its completion time.
    Marker(Stamp),
    /// Hold the lane until another timeline reaches a sequence number.
    Wait(crate::tracker::Waypoint),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Task(_) => "task",
            Payload::Marker(_) => "marker",
            Payload::Wait(_) => "wait",
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// A unit of work with its position in one stream's timeline.
///
/// Immutable once enqueued. Sequences start at 1; 0 means "nothing yet".
#[derive(Debug)]
pub struct WorkUnit {
    pub sequence: u64,
    pub payload: Payload,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Point-in-time counts of the objects a context is tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    /// Streams created and not yet destroyed.
    pub live_streams: usize,
    /// Events created and not yet destroyed.
    pub live_events: usize,
    /// Lanes whose thread is still running (live streams plus destroyed
    /// streams that have not finished draining).
    pub running_lanes: usize,
}
