//! Completion tracker: one execution lane per stream, advancing cursors.

pub mod lane;
pub mod timeline;

pub use timeline::{Timeline, Waypoint};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::error::Result;
use crate::model::{StreamId, WorkUnit};

/// The producer side of a freshly opened lane.
pub struct LaneHandle {
    pub timeline: Arc<Timeline>,
    pub sender: UnboundedSender<WorkUnit>,
}

/// Spawns lanes and keeps their threads joinable for teardown.
pub struct Tracker {
    config: ContextConfig,
    threads: Mutex<Vec<(StreamId, JoinHandle<()>)>>,
    running: Arc<AtomicUsize>,
}

impl Tracker {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            threads: Mutex::new(Vec::new()),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start a lane for `stream` and return its timeline and queue sender.
    ///
    /// The lane runs until the returned sender is dropped and everything
    /// already sent has completed.
    pub fn open_lane(&self, stream: StreamId) -> Result<LaneHandle> {
        let timeline = Arc::new(Timeline::new(stream, self.config.wake_interval()));
        let (sender, queue) = mpsc::unbounded_channel();

        self.running.fetch_add(1, Ordering::AcqRel);
        let running = Arc::clone(&self.running);
        let lane_timeline = Arc::clone(&timeline);
        let spawned = std::thread::Builder::new()
            .name(format!("{}-{}", self.config.lane_prefix, &stream.0.to_string()[..8]))
            .spawn(move || lane::run(lane_timeline, queue, running));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.running.fetch_sub(1, Ordering::AcqRel);
                return Err(e.into());
            }
        };

        let mut threads = self.threads.lock();
        threads.retain(|(_, t)| !t.is_finished());
        threads.push((stream, thread));

        Ok(LaneHandle { timeline, sender })
    }

    /// Lanes whose thread has not exited yet.
    pub fn running_lanes(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Join every lane thread. Only returns once all senders are gone and
    /// each lane has drained its queue.
    ///
    /// When called from a lane itself (the context dropped inside one of its
    /// own tasks), that lane is detached instead of joined.
    pub fn join_all(&self) {
        let threads = std::mem::take(&mut *self.threads.lock());
        let current = std::thread::current().id();
        for (stream, thread) in threads {
            if thread.thread().id() == current {
                debug!(%stream, "detaching current lane");
                continue;
            }
            if thread.join().is_err() {
                warn!(%stream, "lane thread panicked");
            }
        }
        debug!("all lanes joined");
    }
}
