//! Metrics for the sync engine
//!
//! Counters go through the `metrics` facade so any recorder installed by the
//! host application picks them up. The engine also keeps its own
//! `SyncStats` so a run can be summarised without a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

mod collector;

pub use collector::{MetricsSnapshot, SyncStats};

pub const OPERATIONS_LOCAL: &str = "sync.operations.local";
pub const OPERATIONS_REMOTE: &str = "sync.operations.remote";
pub const OPERATIONS_SUPERSEDED: &str = "sync.operations.superseded";
pub const MESSAGES_RECEIVED: &str = "sync.messages.received";
pub const MESSAGES_SENT: &str = "sync.messages.sent";
pub const CATCHUP_REQUESTS: &str = "sync.catchup.requests";
pub const CATCHUP_DURATION: &str = "sync.catchup.duration_ms";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(OPERATIONS_LOCAL, "Operations created on this node");
    describe_counter!(OPERATIONS_REMOTE, "Operations received from peers");
    describe_counter!(OPERATIONS_SUPERSEDED, "Remote operations skipped as superseded");
    describe_counter!(MESSAGES_RECEIVED, "Messages handed to the engine by the transport");
    describe_counter!(MESSAGES_SENT, "Messages sent through the transport");
    describe_counter!(CATCHUP_REQUESTS, "request-operations messages sent after joining");
    describe_histogram!(CATCHUP_DURATION, "Time spent applying a catch-up batch in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}
