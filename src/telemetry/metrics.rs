//! Metric instrument factories for streamsync.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider these are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("streamsync")
}

/// Counter: work units appended to a stream.
/// Labels: `kind` ("task" | "marker" | "wait").
pub fn units_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("streamsync.units.enqueued")
        .with_description("Number of work units enqueued")
        .build()
}

/// Counter: work units a lane has run and advanced past.
/// Labels: `kind`.
pub fn units_completed() -> Counter<u64> {
    meter()
        .u64_counter("streamsync.units.completed")
        .with_description("Number of work units completed")
        .build()
}

/// Counter: event record calls.
pub fn events_recorded() -> Counter<u64> {
    meter()
        .u64_counter("streamsync.events.recorded")
        .with_description("Number of event records")
        .build()
}

/// Counter: event queries.
/// Labels: `result` ("ready" | "not_ready").
pub fn event_queries() -> Counter<u64> {
    meter()
        .u64_counter("streamsync.events.queries")
        .with_description("Number of event queries")
        .build()
}

/// Histogram: time a host thread spent blocked in synchronize.
/// Labels: `target` ("stream" | "event").
pub fn synchronize_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("streamsync.synchronize.wait_ms")
        .with_description("Time spent blocked in synchronize")
        .with_unit("ms")
        .build()
}
