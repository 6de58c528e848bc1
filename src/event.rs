//! Events: snapshots of a point in some stream's timeline.
//!
//! An event holds its capture and its sticky completion flag behind one
//! lock, so a concurrent re-record and query never see a torn pair. The
//! capture references the stream's timeline, not the stream, so the answer
//! survives the stream being destroyed.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::model::{EventId, QueryStatus, Stamp};
use crate::tracker::Waypoint;

/// What `record` snapshots: the marker's position and its completion stamp.
#[derive(Debug, Clone)]
pub struct Capture {
    pub waypoint: Waypoint,
    pub stamp: Stamp,
}

#[derive(Debug, Default)]
struct EventState {
    capture: Option<Capture>,
    sticky_done: bool,
    /// Bumped on every record; lets a finished wait tell whether the
    /// capture it waited on is still current.
    generation: u64,
}

#[derive(Debug)]
pub struct EventCell {
    id: EventId,
    state: Mutex<EventState>,
}

impl EventCell {
    pub fn new(id: EventId) -> Self {
        Self {
            id,
            state: Mutex::new(EventState::default()),
        }
    }

    /// Replace the capture. Sticky completion carries over only if the new
    /// point is already reached.
    pub fn record(&self, capture: Capture) {
        let done = capture.waypoint.is_reached();
        let mut state = self.state.lock();
        state.capture = Some(capture);
        state.sticky_done = done;
        state.generation += 1;
    }

    /// Non-blocking completion check. Caches the first observed completion.
    pub fn query(&self) -> QueryStatus {
        let mut state = self.state.lock();
        if state.sticky_done {
            return QueryStatus::Ready;
        }
        let done = match state.capture {
            None => return QueryStatus::Ready,
            Some(ref capture) => capture.waypoint.is_reached(),
        };
        state.sticky_done = done;
        QueryStatus::from(done)
    }

    /// Block until the current capture completes.
    ///
    /// The lock is released while waiting. If the event is re-recorded in
    /// the meantime, the newer capture is left untouched.
    pub fn synchronize(&self) -> Result<()> {
        let (waypoint, generation) = {
            let state = self.state.lock();
            match state.capture {
                Some(ref capture) if !state.sticky_done => {
                    (capture.waypoint.clone(), state.generation)
                }
                _ => return Ok(()),
            }
        };

        waypoint.wait()?;

        let mut state = self.state.lock();
        if state.generation == generation {
            state.sticky_done = true;
        }
        Ok(())
    }

    /// The captured point, if recorded.
    pub fn waypoint(&self) -> Option<Waypoint> {
        self.state
            .lock()
            .capture
            .as_ref()
            .map(|c| c.waypoint.clone())
    }

    /// When the captured marker completed, or `None` while still pending.
    pub fn completed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.lock();
        let capture = state.capture.as_ref().ok_or(Error::Unrecorded(self.id))?;
        // The lane stamps before it advances; only report once the cursor agrees.
        if !state.sticky_done && !capture.waypoint.is_reached() {
            return Ok(None);
        }
        Ok(capture.stamp.get().copied())
    }
}
