//! Per-stream completion cursor.
//!
//! A timeline is the part of a stream that outlives it: the tail (highest
//! sequence handed out), the cursor (highest sequence durably completed)
//! and the wakeup channel for blocked waiters. Event captures hold an
//! `Arc<Timeline>`, so a destroyed stream's final cursor stays answerable
//! until the last capture pointing at it is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{Error, Result};
use crate::model::StreamId;

pub struct Timeline {
    stream: StreamId,
    /// Highest completed sequence. Single writer: the stream's lane.
    cursor: AtomicU64,
    /// Highest reserved sequence. Written under the stream's submit lock.
    tail: AtomicU64,
    gate: Mutex<()>,
    advanced: Condvar,
    wake_interval: Duration,
}

impl Timeline {
    pub(crate) fn new(stream: StreamId, wake_interval: Duration) -> Self {
        Self {
            stream,
            cursor: AtomicU64::new(0),
            tail: AtomicU64::new(0),
            gate: Mutex::new(()),
            advanced: Condvar::new(),
            wake_interval,
        }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Highest sequence completed so far. Never blocks.
    ///
    /// Acquire pairs with the lane's release store: observing `n` here
    /// means every effect of units `<= n` is visible to the caller.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Highest sequence enqueued so far.
    pub fn tail(&self) -> u64 {
        self.tail.load(Ordering::Acquire)
    }

    pub fn is_reached(&self, sequence: u64) -> bool {
        self.cursor() >= sequence
    }

    /// Hand out the next sequence number. Callers must serialize this with
    /// the send into the lane queue so that queue order equals sequence order.
    pub(crate) fn reserve(&self) -> u64 {
        self.tail.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Publish completion of `sequence` and wake waiters.
    pub(crate) fn advance_to(&self, sequence: u64) {
        debug_assert_eq!(sequence, self.cursor.load(Ordering::Relaxed) + 1);
        self.cursor.store(sequence, Ordering::Release);

        // Taking the gate orders this notify after any waiter's cursor check.
        let _gate = self.gate.lock();
        self.advanced.notify_all();
    }

    /// Block the calling thread until the cursor reaches `sequence`.
    ///
    /// Returns immediately when already satisfied. A sequence beyond the
    /// current tail has not been enqueued and may never be, so waiting on it
    /// fails with `NeverReached` instead of hanging.
    pub fn block_until(&self, sequence: u64) -> Result<()> {
        if self.is_reached(sequence) {
            return Ok(());
        }

        let tail = self.tail();
        if sequence > tail {
            return Err(Error::NeverReached {
                stream: self.stream,
                requested: sequence,
                tail,
            });
        }

        let mut gate = self.gate.lock();
        while !self.is_reached(sequence) {
            let timed_out = self
                .advanced
                .wait_for(&mut gate, self.wake_interval)
                .timed_out();
            if timed_out {
                trace!(stream = %self.stream, sequence, cursor = self.cursor(), "still waiting");
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("stream", &self.stream)
            .field("cursor", &self.cursor())
            .field("tail", &self.tail())
            .finish_non_exhaustive()
    }
}

/// A `(timeline, sequence)` pair: one point in one stream's history.
#[derive(Debug, Clone)]
pub struct Waypoint {
    timeline: Arc<Timeline>,
    sequence: u64,
}

impl Waypoint {
    pub(crate) fn new(timeline: Arc<Timeline>, sequence: u64) -> Self {
        Self { timeline, sequence }
    }

    pub fn stream(&self) -> StreamId {
        self.timeline.stream()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_reached(&self) -> bool {
        self.timeline.is_reached(self.sequence)
    }

    pub fn wait(&self) -> Result<()> {
        self.timeline.block_until(self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> Arc<Timeline> {
        Arc::new(Timeline::new(StreamId::new(), Duration::from_millis(5)))
    }

    #[test]
    fn reserve_then_advance_moves_cursor() {
        let t = timeline();
        assert_eq!(t.reserve(), 1);
        assert_eq!(t.reserve(), 2);
        assert_eq!(t.tail(), 2);
        assert_eq!(t.cursor(), 0);

        t.advance_to(1);
        assert!(t.is_reached(1));
        assert!(!t.is_reached(2));
    }

    #[test]
    fn block_until_unreserved_sequence_fails() {
        let t = timeline();
        t.reserve();
        match t.block_until(2) {
            Err(Error::NeverReached { requested, tail, .. }) => {
                assert_eq!((requested, tail), (2, 1));
            }
            other => panic!("expected NeverReached, got {other:?}"),
        }
    }

    #[test]
    fn block_until_wakes_on_advance() {
        let t = timeline();
        t.reserve();
        t.reserve();

        let advancer = {
            let t = Arc::clone(&t);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                t.advance_to(1);
                t.advance_to(2);
            })
        };

        t.block_until(2).unwrap();
        assert_eq!(t.cursor(), 2);
        advancer.join().unwrap();
    }

    #[test]
    fn waypoint_outlives_owner_handles() {
        let t = timeline();
        let seq = t.reserve();
        let waypoint = Waypoint::new(Arc::clone(&t), seq);
        t.advance_to(seq);
        drop(t);

        assert!(waypoint.is_reached());
        waypoint.wait().unwrap();
    }
}
