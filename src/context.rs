//! Synchronization façade. The public API for streams and events.
//!
//! A `Context` owns the stream and event registries and the tracker that
//! runs the lanes. Every handle is only meaningful within the context that
//! created it. Registries start empty and are drained on shutdown.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::ContextConfig;
use crate::error::{Error, Result};
use crate::event::{Capture, EventCell};
use crate::model::*;
use crate::stream::StreamSlot;
use crate::telemetry::lane::start_wait_span;
use crate::telemetry::metrics;
use crate::tracker::{Tracker, Waypoint};

struct Instruments {
    units_enqueued: Counter<u64>,
    events_recorded: Counter<u64>,
    event_queries: Counter<u64>,
    synchronize_wait_ms: Histogram<f64>,
}

impl Instruments {
    fn new() -> Self {
        Self {
            units_enqueued: metrics::units_enqueued(),
            events_recorded: metrics::events_recorded(),
            event_queries: metrics::event_queries(),
            synchronize_wait_ms: metrics::synchronize_wait_ms(),
        }
    }
}

/// Live stream slots, plus whether the context still accepts new streams.
///
/// Both sit behind one lock: a lane is only ever opened while `closed` is
/// false, and its slot is inserted before the lock is released, so shutdown
/// always seals every lane it later joins.
#[derive(Default)]
struct StreamRegistry {
    slots: HashMap<StreamId, Arc<StreamSlot>>,
    closed: bool,
}

/// Process-scoped state for one set of streams and events.
pub struct Context {
    tracker: Tracker,
    streams: RwLock<StreamRegistry>,
    events: RwLock<HashMap<EventId, Arc<EventCell>>>,
    instruments: Instruments,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl Context {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            tracker: Tracker::new(config),
            streams: RwLock::new(StreamRegistry::default()),
            events: RwLock::new(HashMap::new()),
            instruments: Instruments::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------------

    /// Create an empty, live stream with its own lane.
    ///
    /// Fails with `Closed` once the context has been shut down.
    pub fn create_stream(&self) -> Result<StreamId> {
        let id = StreamId::new();
        let mut streams = self.streams.write();
        if streams.closed {
            return Err(Error::Closed);
        }
        let lane = self.tracker.open_lane(id)?;
        streams.slots.insert(id, Arc::new(StreamSlot::new(id, lane)));
        drop(streams);
        info!(stream = %id, "stream created");
        Ok(id)
    }

    /// Release a stream handle. Does not wait: work already enqueued still
    /// runs to completion, and events captured on it keep answering.
    pub fn destroy_stream(&self, stream: StreamId) -> Result<()> {
        let slot = self
            .streams
            .write()
            .slots
            .remove(&stream)
            .ok_or(Error::InvalidStream(stream))?;
        slot.seal();

        let timeline = slot.timeline();
        info!(
            %stream,
            cursor = timeline.cursor(),
            tail = timeline.tail(),
            "stream destroyed"
        );
        Ok(())
    }

    /// Block until everything enqueued on `stream` before this call completes.
    pub fn synchronize_stream(&self, stream: StreamId) -> Result<()> {
        let slot = self.stream(stream)?;
        let timeline = slot.timeline();
        let tail = timeline.tail();
        if timeline.is_reached(tail) {
            return Ok(());
        }

        let span = start_wait_span("stream", &stream, tail);
        let _entered = span.enter();
        let started = Instant::now();
        timeline.block_until(tail)?;
        self.record_wait("stream", started);
        Ok(())
    }

    /// Non-blocking: has everything enqueued on `stream` completed?
    pub fn query_stream(&self, stream: StreamId) -> Result<QueryStatus> {
        let slot = self.stream(stream)?;
        let timeline = slot.timeline();
        Ok(QueryStatus::from(timeline.is_reached(timeline.tail())))
    }

    /// Append an opaque unit of work. Returns its sequence number.
    pub fn enqueue<F>(&self, stream: StreamId, effect: F) -> Result<u64>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(stream, Payload::Task(Box::new(effect)))
    }

    /// Current completion cursor of a live stream.
    pub fn cursor_of(&self, stream: StreamId) -> Result<u64> {
        Ok(self.stream(stream)?.timeline().cursor())
    }

    /// Block until the cursor of `stream` reaches `sequence`.
    pub fn block_until(&self, stream: StreamId, sequence: u64) -> Result<()> {
        let slot = self.stream(stream)?;
        slot.timeline().block_until(sequence)
    }

    /// Make `stream` hold until `event`'s current capture has completed.
    ///
    /// The capture is resolved now; re-recording the event later does not
    /// affect the wait. An unrecorded event makes this a no-op.
    pub fn stream_wait_event(&self, stream: StreamId, event: EventId) -> Result<()> {
        self.stream(stream)?;
        let Some(waypoint) = self.event(event)?.waypoint() else {
            return Ok(());
        };
        if waypoint.is_reached() {
            return Ok(());
        }

        debug!(
            %stream,
            %event,
            upstream = %waypoint.stream(),
            sequence = waypoint.sequence(),
            "stream waits on event"
        );
        self.submit(stream, Payload::Wait(waypoint))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Create an unrecorded event.
    pub fn create_event(&self) -> EventId {
        let id = EventId::new();
        self.events.write().insert(id, Arc::new(EventCell::new(id)));
        debug!(event = %id, "event created");
        id
    }

    /// Release an event. Streams it was recorded on are unaffected.
    pub fn destroy_event(&self, event: EventId) -> Result<()> {
        self.events
            .write()
            .remove(&event)
            .ok_or(Error::InvalidEvent(event))?;
        debug!(%event, "event destroyed");
        Ok(())
    }

    /// Capture the current end of `stream` in `event`.
    ///
    /// A marker unit is appended, so recording twice on one stream always
    /// captures a strictly later point.
    pub fn record_event(&self, event: EventId, stream: StreamId) -> Result<()> {
        let cell = self.event(event)?;
        let slot = self.stream(stream)?;

        let stamp: Stamp = Arc::new(OnceLock::new());
        let waypoint = slot.submit_waypoint(Payload::Marker(Arc::clone(&stamp)))?;
        self.instruments
            .units_enqueued
            .add(1, &[KeyValue::new("kind", "marker")]);
        self.instruments.events_recorded.add(1, &[]);

        debug!(%event, %stream, sequence = waypoint.sequence(), "event recorded");
        cell.record(Capture { waypoint, stamp });
        Ok(())
    }

    /// Non-blocking completion check. Never errors for a live event, even
    /// if the stream it was recorded on has since been destroyed.
    pub fn query_event(&self, event: EventId) -> Result<QueryStatus> {
        let status = self.event(event)?.query();
        self.instruments
            .event_queries
            .add(1, &[KeyValue::new("result", status.as_str())]);
        Ok(status)
    }

    /// Block until the event's capture has completed.
    pub fn synchronize_event(&self, event: EventId) -> Result<()> {
        let cell = self.event(event)?;
        let Some(waypoint) = cell.waypoint() else {
            return Ok(());
        };

        let span = start_wait_span("event", &waypoint.stream(), waypoint.sequence());
        let _entered = span.enter();
        let started = Instant::now();
        cell.synchronize()?;
        self.record_wait("event", started);
        Ok(())
    }

    /// When the event's captured marker completed, or `None` while pending.
    pub fn event_completed_at(&self, event: EventId) -> Result<Option<DateTime<Utc>>> {
        self.event(event)?.completed_at()
    }

    /// Milliseconds between the completion of two recorded events.
    ///
    /// `Ok(None)` while either is still pending.
    pub fn elapsed_ms(&self, start: EventId, end: EventId) -> Result<Option<f64>> {
        let start = self.event_completed_at(start)?;
        let end = self.event_completed_at(end)?;
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(None);
        };
        let micros = (end - start).num_microseconds().unwrap_or(i64::MAX);
        Ok(Some(micros as f64 / 1000.0))
    }

    /// The point an event currently watches, if recorded.
    pub fn event_waypoint(&self, event: EventId) -> Result<Option<Waypoint>> {
        Ok(self.event(event)?.waypoint())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            live_streams: self.streams.read().slots.len(),
            live_events: self.events.read().len(),
            running_lanes: self.tracker.running_lanes(),
        }
    }

    /// Release every handle and wait for all lanes to drain.
    ///
    /// Blocks until queued work finishes. Idempotent. No new streams can be
    /// created afterwards.
    pub fn shutdown(&self) {
        let streams = {
            let mut registry = self.streams.write();
            registry.closed = true;
            std::mem::take(&mut registry.slots)
        };
        let events = std::mem::take(&mut *self.events.write());
        for slot in streams.values() {
            slot.seal();
        }
        if !streams.is_empty() || !events.is_empty() {
            info!(
                streams = streams.len(),
                events = events.len(),
                "context shutting down"
            );
        }
        drop(streams);
        drop(events);
        self.tracker.join_all();
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn stream(&self, stream: StreamId) -> Result<Arc<StreamSlot>> {
        self.streams
            .read()
            .slots
            .get(&stream)
            .cloned()
            .ok_or(Error::InvalidStream(stream))
    }

    fn event(&self, event: EventId) -> Result<Arc<EventCell>> {
        self.events
            .read()
            .get(&event)
            .cloned()
            .ok_or(Error::InvalidEvent(event))
    }

    fn submit(&self, stream: StreamId, payload: Payload) -> Result<u64> {
        let kind = payload.kind();
        let sequence = self.stream(stream)?.submit(payload)?;
        self.instruments
            .units_enqueued
            .add(1, &[KeyValue::new("kind", kind)]);
        Ok(sequence)
    }

    fn record_wait(&self, target: &'static str, started: Instant) {
        let waited_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.instruments
            .synchronize_wait_ms
            .record(waited_ms, &[KeyValue::new("target", target)]);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}
