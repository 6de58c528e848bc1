//! Integration tests for event query semantics.

use std::sync::mpsc;

use streamsync::{Context, Error, QueryStatus};

fn test_context() -> Context {
    Context::default()
}

/// Enqueue a task that holds the lane until the returned sender fires.
fn hold_lane(ctx: &Context, stream: streamsync::StreamId) -> mpsc::Sender<()> {
    let (release, gate) = mpsc::channel::<()>();
    ctx.enqueue(stream, move || {
        let _ = gate.recv();
    })
    .unwrap();
    release
}

// ---------------------------------------------------------------------------
// Basic scenarios
// ---------------------------------------------------------------------------

#[test]
fn query_without_record_is_ready() {
    let ctx = test_context();
    let event = ctx.create_event();

    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);

    ctx.destroy_event(event).unwrap();
}

#[test]
fn simple_query_ready_after_stream_synchronize() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    ctx.record_event(event, stream).unwrap();

    // Either answer is legal before the stream is synchronized.
    let early = ctx.query_event(event).unwrap();
    assert!(matches!(early, QueryStatus::Ready | QueryStatus::NotReady));

    ctx.synchronize_stream(stream).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);

    ctx.destroy_event(event).unwrap();
    ctx.destroy_stream(stream).unwrap();
}

#[test]
fn pending_capture_reports_not_ready() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    let release = hold_lane(&ctx, stream);
    ctx.record_event(event, stream).unwrap();

    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::NotReady);
    assert!(ctx.event_completed_at(event).unwrap().is_none());

    release.send(()).unwrap();
    ctx.synchronize_event(event).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);
    assert!(ctx.event_completed_at(event).unwrap().is_some());
}

#[test]
fn same_stream_rerecord_advances_watched_point() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    ctx.record_event(event, stream).unwrap();
    let first = ctx.event_waypoint(event).unwrap().unwrap().sequence();

    let release = hold_lane(&ctx, stream);
    ctx.record_event(event, stream).unwrap();
    let second = ctx.event_waypoint(event).unwrap().unwrap().sequence();
    assert!(second > first);

    // The second capture sits behind the held task.
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::NotReady);

    release.send(()).unwrap();
    ctx.synchronize_stream(stream).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);
}

#[test]
fn same_stream_record_twice_then_sync() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    ctx.record_event(event, stream).unwrap();
    ctx.record_event(event, stream).unwrap();

    let early = ctx.query_event(event).unwrap();
    assert!(matches!(early, QueryStatus::Ready | QueryStatus::NotReady));

    ctx.synchronize_stream(stream).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);

    ctx.destroy_event(event).unwrap();
    ctx.destroy_stream(stream).unwrap();
}

#[test]
fn two_streams_ready_after_both_synchronized() {
    let ctx = test_context();
    let first = ctx.create_stream().unwrap();
    let second = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    ctx.record_event(event, first).unwrap();
    ctx.record_event(event, second).unwrap();
    assert_eq!(
        ctx.event_waypoint(event).unwrap().unwrap().stream(),
        second
    );

    ctx.synchronize_stream(first).unwrap();
    ctx.synchronize_stream(second).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);

    ctx.destroy_event(event).unwrap();
    ctx.destroy_stream(first).unwrap();
    ctx.destroy_stream(second).unwrap();
}

#[test]
fn rerecord_on_other_stream_replaces_capture() {
    let ctx = test_context();
    let busy = ctx.create_stream().unwrap();
    let idle = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    let release = hold_lane(&ctx, busy);
    ctx.record_event(event, busy).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::NotReady);

    // The new capture is on an idle stream; the held one no longer matters.
    ctx.record_event(event, idle).unwrap();
    ctx.synchronize_event(event).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);

    release.send(()).unwrap();
}

#[test]
fn query_after_stream_destroy_stays_ready() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    ctx.record_event(event, stream).unwrap();
    ctx.synchronize_stream(stream).unwrap();
    ctx.destroy_stream(stream).unwrap();

    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);

    ctx.destroy_event(event).unwrap();
}

// ---------------------------------------------------------------------------
// Sticky completion and destroyed streams
// ---------------------------------------------------------------------------

#[test]
fn ready_is_sticky_across_repeated_queries() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    ctx.record_event(event, stream).unwrap();
    ctx.synchronize_event(event).unwrap();

    for _ in 0..100 {
        assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);
    }
}

#[test]
fn stream_destroyed_while_capture_pending() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    let release = hold_lane(&ctx, stream);
    ctx.record_event(event, stream).unwrap();
    ctx.destroy_stream(stream).unwrap();

    // Still answered from the retained timeline, never an error.
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::NotReady);

    release.send(()).unwrap();
    ctx.synchronize_event(event).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);
}

#[test]
fn synchronize_unrecorded_event_returns_immediately() {
    let ctx = test_context();
    let event = ctx.create_event();
    ctx.synchronize_event(event).unwrap();
    assert_eq!(ctx.query_event(event).unwrap(), QueryStatus::Ready);
}

// ---------------------------------------------------------------------------
// Handle errors
// ---------------------------------------------------------------------------

#[test]
fn double_destroy_event_is_invalid_handle() {
    let ctx = test_context();
    let event = ctx.create_event();
    ctx.destroy_event(event).unwrap();

    let err = ctx.destroy_event(event).unwrap_err();
    assert!(matches!(err, Error::InvalidEvent(id) if id == event));
    assert!(err.is_invalid_handle());
}

#[test]
fn operations_on_destroyed_event_fail() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let event = ctx.create_event();
    ctx.destroy_event(event).unwrap();

    assert!(ctx.query_event(event).unwrap_err().is_invalid_handle());
    assert!(ctx.synchronize_event(event).unwrap_err().is_invalid_handle());
    assert!(ctx.record_event(event, stream).unwrap_err().is_invalid_handle());
}

#[test]
fn record_on_destroyed_stream_fails_and_keeps_old_capture() {
    let ctx = test_context();
    let live = ctx.create_stream().unwrap();
    let dead = ctx.create_stream().unwrap();
    let event = ctx.create_event();

    ctx.record_event(event, live).unwrap();
    ctx.destroy_stream(dead).unwrap();

    let err = ctx.record_event(event, dead).unwrap_err();
    assert!(matches!(err, Error::InvalidStream(id) if id == dead));
    assert_eq!(ctx.event_waypoint(event).unwrap().unwrap().stream(), live);
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

#[test]
fn elapsed_between_markers_is_non_negative() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let start = ctx.create_event();
    let end = ctx.create_event();

    ctx.record_event(start, stream).unwrap();
    ctx.enqueue(stream, || std::thread::sleep(std::time::Duration::from_millis(20)))
        .unwrap();
    ctx.record_event(end, stream).unwrap();
    ctx.synchronize_event(end).unwrap();

    let elapsed = ctx.elapsed_ms(start, end).unwrap().expect("both completed");
    assert!(elapsed >= 15.0, "elapsed {elapsed}ms");
}

#[test]
fn elapsed_pending_is_none_and_unrecorded_is_error() {
    let ctx = test_context();
    let stream = ctx.create_stream().unwrap();
    let start = ctx.create_event();
    let end = ctx.create_event();
    let never = ctx.create_event();

    ctx.record_event(start, stream).unwrap();
    let release = hold_lane(&ctx, stream);
    ctx.record_event(end, stream).unwrap();
    ctx.synchronize_event(start).unwrap();

    assert_eq!(ctx.elapsed_ms(start, end).unwrap(), None);

    let err = ctx.elapsed_ms(start, never).unwrap_err();
    assert!(matches!(err, Error::Unrecorded(id) if id == never));

    release.send(()).unwrap();
}
