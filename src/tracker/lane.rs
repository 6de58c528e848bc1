//! Execution lane: the single consumer of one stream's queue.
//!
//! Each lane runs on its own OS thread, pops units in submission order,
//! runs their effect and only then advances the stream's cursor. The lane
//! exits once the stream's sender is dropped and the queue is empty.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, warn};

use super::timeline::Timeline;
use crate::model::{Payload, WorkUnit};
use crate::telemetry::lane::{record_lane_drained, start_lane_span};
use crate::telemetry::metrics;

/// Decrements the running-lane count however the lane thread ends.
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Lane thread body. `running` was already incremented by the spawner.
pub(super) fn run(
    timeline: Arc<Timeline>,
    mut queue: UnboundedReceiver<WorkUnit>,
    running: Arc<AtomicUsize>,
) {
    let _running = RunningGuard(running);
    let span = start_lane_span(&timeline.stream());
    let _entered = span.enter();
    let completed_counter = metrics::units_completed();

    debug!("lane started");

    let mut completed = 0u64;
    while let Some(unit) = queue.blocking_recv() {
        execute(&timeline, unit, &completed_counter);
        completed += 1;
    }

    record_lane_drained(&span, completed, timeline.cursor());
}

fn execute(timeline: &Timeline, unit: WorkUnit, completed_counter: &Counter<u64>) {
    let WorkUnit { sequence, payload } = unit;
    let kind = payload.kind();

    match payload {
        Payload::Task(effect) => {
            // Payload failures are outside the ordering contract; the
            // position still completes so waiters behind it are released.
            if catch_unwind(AssertUnwindSafe(effect)).is_err() {
                error!(sequence, "task panicked, advancing past it");
            }
        }
        Payload::Marker(stamp) => {
            if stamp.set(Utc::now()).is_err() {
                warn!(sequence, "marker stamped twice");
            }
        }
        Payload::Wait(waypoint) => {
            if let Err(e) = waypoint.wait() {
                warn!(sequence, upstream = %waypoint.stream(), "wait unit skipped: {e}");
            }
        }
    }

    timeline.advance_to(sequence);
    completed_counter.add(1, &[KeyValue::new("kind", kind)]);
}
