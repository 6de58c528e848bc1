//! Lane execution span helpers.
//!
//! Every lane thread runs inside one `stream.lane` span for its whole life.

use tracing::Span;

use crate::model::StreamId;

/// Start the span a lane thread runs under.
///
/// `lane.completed` and `lane.final_cursor` are declared empty and filled
/// in by [`record_lane_drained`].
pub fn start_lane_span(stream: &StreamId) -> Span {
    tracing::info_span!(
        "stream.lane",
        "stream.id" = %stream,
        "lane.completed" = tracing::field::Empty,
        "lane.final_cursor" = tracing::field::Empty,
    )
}

/// Record that a lane drained its queue and is exiting.
pub fn record_lane_drained(span: &Span, completed: u64, final_cursor: u64) {
    span.record("lane.completed", completed);
    span.record("lane.final_cursor", final_cursor);
    span.in_scope(|| {
        tracing::debug!(completed, final_cursor, "lane drained");
    });
}

/// Span for a host thread blocked in a synchronize call.
pub fn start_wait_span(target: &str, stream: &StreamId, sequence: u64) -> Span {
    tracing::debug_span!(
        "stream.wait",
        "wait.target" = target,
        "stream.id" = %stream,
        "wait.sequence" = sequence,
    )
}
