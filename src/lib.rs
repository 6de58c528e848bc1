//! # streamsync
//!
//! Ordered work streams with asynchronous completion tracking.
//!
//! Work is enqueued onto streams, each drained in order by its own lane.
//! Events capture a point in a stream's timeline and can be queried
//! without blocking or synchronized on, independently of the stream's
//! later lifecycle. Everything is reached through a [`Context`].

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod model;
pub mod stream;
pub mod telemetry;
pub mod tracker;

pub use context::Context;
pub use error::{Error, Result};
pub use model::{ContextStats, EventId, QueryStatus, StreamId};
