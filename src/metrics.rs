//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics through the `metrics` facade for:
//! - Change events received, buffered, applied and discarded
//! - Snapshot application and buffered replay
//! - Reconciliation errors by kind
//! - Replica size and reconciler phase
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `live_table_` and labelled by `table`:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! Without an installed recorder every call is a no-op.

use crate::reconciler::Phase;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a change event received from the subscription.
pub fn record_event_received(table: &str, kind: &str) {
    counter!("live_table_events_received_total", "table" => table.to_string(), "kind" => kind.to_string()).increment(1);
}

/// Record a change event held back until the snapshot arrives.
pub fn record_event_buffered(table: &str) {
    counter!("live_table_events_buffered_total", "table" => table.to_string()).increment(1);
}

/// Record the outcome of applying a change event (`inserted`, `duplicate`, ...).
pub fn record_event_outcome(table: &str, outcome: &str) {
    counter!("live_table_event_outcomes_total", "table" => table.to_string(), "outcome" => outcome.to_string()).increment(1);
}

/// Record a snapshot application.
pub fn record_snapshot_applied(table: &str, rows: usize, duration: Duration) {
    counter!("live_table_snapshots_total", "table" => table.to_string()).increment(1);
    histogram!("live_table_snapshot_rows", "table" => table.to_string()).record(rows as f64);
    histogram!("live_table_snapshot_apply_duration_seconds", "table" => table.to_string())
        .record(duration.as_secs_f64());
}

/// Record the snapshot fetch latency (source round-trip).
pub fn record_snapshot_fetch_latency(table: &str, duration: Duration) {
    histogram!("live_table_snapshot_fetch_duration_seconds", "table" => table.to_string())
        .record(duration.as_secs_f64());
}

/// Record buffered replay results after a snapshot.
pub fn record_replay(table: &str, replayed: usize, discarded: usize) {
    counter!("live_table_replayed_events_total", "table" => table.to_string()).increment(replayed as u64);
    counter!("live_table_replay_discarded_total", "table" => table.to_string()).increment(discarded as u64);
}

/// Record errors by kind.
pub fn record_error(table: &str, error_kind: &str) {
    counter!("live_table_errors_total", "table" => table.to_string(), "error_kind" => error_kind.to_string()).increment(1);
}

/// Gauge for the number of buffered events.
pub fn set_buffered_events(table: &str, count: usize) {
    gauge!("live_table_buffered_events", "table" => table.to_string()).set(count as f64);
}

/// Gauge for the number of rows in the replica.
pub fn set_replica_rows(table: &str, count: usize) {
    gauge!("live_table_replica_rows", "table" => table.to_string()).set(count as f64);
}

/// Gauge for the reconciler phase (0=buffering, 1=live).
pub fn set_phase(table: &str, phase: Phase) {
    let value = match phase {
        Phase::Buffering => 0.0,
        Phase::Live => 1.0,
    };
    gauge!("live_table_phase", "table" => table.to_string()).set(value);
}

/// Set the phase gauge to 2 once the host has been torn down.
pub fn set_stopped(table: &str) {
    gauge!("live_table_phase", "table" => table.to_string()).set(2.0);
}
