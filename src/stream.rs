//! Stream: the producer end of an ordered work queue.
//!
//! The slot pairs a lane's sender with its timeline. Sequence reservation
//! and the send happen under one lock, so queue order is sequence order
//! even with several host threads enqueueing onto the same stream.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Error, Result};
use crate::model::{Payload, StreamId, WorkUnit};
use crate::tracker::{LaneHandle, Timeline, Waypoint};

pub struct StreamSlot {
    id: StreamId,
    timeline: Arc<Timeline>,
    /// `None` once the stream is sealed by destroy.
    sender: Mutex<Option<UnboundedSender<WorkUnit>>>,
}

impl StreamSlot {
    pub fn new(id: StreamId, lane: LaneHandle) -> Self {
        Self {
            id,
            timeline: lane.timeline,
            sender: Mutex::new(Some(lane.sender)),
        }
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    /// Append a unit and return its sequence number. Never blocks on the lane.
    pub fn submit(&self, payload: Payload) -> Result<u64> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(Error::InvalidStream(self.id));
        };

        let sequence = self.timeline.reserve();
        sender
            .send(WorkUnit { sequence, payload })
            .map_err(|_| Error::Other(format!("lane for {} is gone", self.id)))?;
        Ok(sequence)
    }

    /// Submit and return the point at which the submitted unit has completed.
    pub fn submit_waypoint(&self, payload: Payload) -> Result<Waypoint> {
        let sequence = self.submit(payload)?;
        Ok(Waypoint::new(Arc::clone(&self.timeline), sequence))
    }

    /// Stop accepting work. Dropping the sender lets the lane exit after
    /// draining what is already queued. Returns false if already sealed.
    pub fn seal(&self) -> bool {
        self.sender.lock().take().is_some()
    }
}
