//! Activation metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the application.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const TRANSITIONS_TOTAL: &str = "herald_push_transitions_total";
    pub const DEFERRED_EVENTS_TOTAL: &str = "herald_push_deferred_events_total";
    pub const PENDING_EVENTS: &str = "herald_push_pending_events";
    pub const PERSIST_ERRORS_TOTAL: &str = "herald_push_persist_errors_total";
}

/// Describe the activation metrics to the installed recorder.
pub fn describe() {
    metrics::describe_counter!(
        names::TRANSITIONS_TOTAL,
        "Activation state transitions, by source and target state"
    );
    metrics::describe_counter!(
        names::DEFERRED_EVENTS_TOTAL,
        "Events deferred to the pending queue, by event"
    );
    metrics::describe_gauge!(names::PENDING_EVENTS, "Current pending queue depth");
    metrics::describe_counter!(
        names::PERSIST_ERRORS_TOTAL,
        "Failed writes of activation state or device"
    );
}

/// Record a transition.
pub fn record_transition(from: &'static str, to: &'static str) {
    counter!(names::TRANSITIONS_TOTAL, "from" => from, "to" => to).increment(1);
}

/// Record an event deferred to the pending queue.
pub fn record_deferred(event: &'static str) {
    counter!(names::DEFERRED_EVENTS_TOTAL, "event" => event).increment(1);
}

/// Set the pending queue depth.
pub fn set_pending(depth: usize) {
    gauge!(names::PENDING_EVENTS).set(depth as f64);
}

/// Record a failed persistence write.
pub fn record_persist_error() {
    counter!(names::PERSIST_ERRORS_TOTAL).increment(1);
}
