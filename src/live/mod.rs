// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Live table host.
//!
//! Wires a [`Reconciler`] to its collaborators:
//!
//! ```text
//! ┌──────────────────┐  on_snapshot()  ┌──────────────────────────┐
//! │  SnapshotSource  │ ──────────────▶ │        LiveTable         │
//! └──────────────────┘                 │  ┌────────────────────┐  │   LiveUpdate   ┌─────────────┐
//! ┌──────────────────┐  on_event()     │  │     Reconciler     │  │ ─────────────▶ │ RecordsSink │
//! │   Subscription   │ ──────────────▶ │  └────────────────────┘  │                └─────────────┘
//! └──────────────────┘  on_status()    └──────────────────────────┘
//! ```
//!
//! After every input that reaches the reconciler the host reports either
//! the current records or the error. With `record_changes` on, each row
//! change is reported first as a [`LiveUpdate::Change`]. Subscription status
//! never touches the replica. After [`LiveTable::stop`] all input is ignored, so a snapshot
//! that resolves after teardown cannot report anything.
//!
//! The async loop that feeds a host lives in [`driver`].

pub mod driver;

use crate::config::LiveTableConfig;
use crate::error::{ReplicaError, Result};
use crate::event::ChangeEvent;
use crate::metrics;
use crate::reconciler::{Applied, Reconciler, RowChange};
use crate::row::Row;
use crate::source::SubscriptionStatus;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What a host reports to its sink.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate<R> {
    /// Copy of the current records.
    Records(Vec<R>),
    /// An input failed. The replica is unchanged by it.
    Error(ReplicaError),
    /// One row-level change, sent before the records it produced.
    Change(RowChange<R>),
}

/// Receiver for [`LiveUpdate`]s.
///
/// Implemented for closures and for [`ChannelSink`].
pub trait RecordsSink<R>: Send {
    fn send(&mut self, update: LiveUpdate<R>);
}

impl<R, F> RecordsSink<R> for F
where
    F: FnMut(LiveUpdate<R>) + Send,
{
    fn send(&mut self, update: LiveUpdate<R>) {
        self(update)
    }
}

/// Sink that forwards updates into an unbounded mpsc channel.
///
/// A closed receiver drops updates silently.
#[derive(Debug, Clone)]
pub struct ChannelSink<R> {
    tx: mpsc::UnboundedSender<LiveUpdate<R>>,
}

impl<R> ChannelSink<R> {
    pub fn new(tx: mpsc::UnboundedSender<LiveUpdate<R>>) -> Self {
        Self { tx }
    }
}

impl<R> From<mpsc::UnboundedSender<LiveUpdate<R>>> for ChannelSink<R> {
    fn from(tx: mpsc::UnboundedSender<LiveUpdate<R>>) -> Self {
        Self::new(tx)
    }
}

impl<R: Send> RecordsSink<R> for ChannelSink<R> {
    fn send(&mut self, update: LiveUpdate<R>) {
        let _ = self.tx.send(update);
    }
}

/// Reconciler plus reporting, for one filtered table.
pub struct LiveTable<R: Row, S> {
    reconciler: Reconciler<R>,
    sink: S,
    channel: String,
    emit_unchanged: bool,
    stopped: bool,
}

impl<R: Row, S: RecordsSink<R>> LiveTable<R, S> {
    /// Create a host in `Buffering`, reporting to `sink`.
    pub fn new(config: &LiveTableConfig, sink: S) -> Self {
        Self {
            reconciler: Reconciler::with_config(
                config.table_name.clone(),
                config.settings.reconciler.clone(),
            ),
            sink,
            channel: config.channel(),
            emit_unchanged: config.settings.emit_unchanged,
            stopped: false,
        }
    }

    /// Handle the snapshot query result.
    ///
    /// A failed query is reported and leaves the reconciler buffering.
    /// Otherwise the row changes are reported, then each replay error, then
    /// the records.
    pub fn on_snapshot(&mut self, result: Result<Vec<R>>) {
        if self.stopped {
            debug!(table = %self.reconciler.table(), "Ignoring snapshot after stop");
            return;
        }

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table = %self.reconciler.table(), error = %e, "Snapshot failed");
                self.report_error(e);
                return;
            }
        };

        let report = self.reconciler.submit_snapshot(rows);
        self.emit_changes();
        for e in report.errors {
            self.sink.send(LiveUpdate::Error(e));
        }
        self.emit_records();
    }

    /// Handle one change event.
    pub fn on_event(&mut self, event: ChangeEvent<R>) {
        if self.stopped {
            debug!(table = %self.reconciler.table(), kind = %event.kind(), "Ignoring event after stop");
            return;
        }

        match self.reconciler.submit_event(event) {
            Ok(Applied::Buffered) => {}
            Ok(applied) if !applied.changed() && !self.emit_unchanged => {}
            Ok(_) => {
                self.emit_changes();
                self.emit_records();
            }
            Err(e) => self.sink.send(LiveUpdate::Error(e)),
        }
    }

    /// Handle a subscription status change.
    pub fn on_status(&mut self, status: SubscriptionStatus) {
        if self.stopped {
            return;
        }

        if !status.is_terminal() {
            info!(table = %self.reconciler.table(), channel = %self.channel, "Subscribed to changes");
            return;
        }

        warn!(
            table = %self.reconciler.table(),
            channel = %self.channel,
            status = %status,
            "Subscription failed"
        );
        let e = ReplicaError::subscription(self.channel.clone(), status.to_string());
        self.report_error(e);
    }

    /// Tear down. Later input of any kind is ignored.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        metrics::set_stopped(self.reconciler.table());
        info!(
            table = %self.reconciler.table(),
            channel = %self.channel,
            rows = self.reconciler.len(),
            "Live table stopped"
        );
    }

    /// Check if [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Copy of the current records.
    pub fn records(&self) -> Vec<R> {
        self.reconciler.records()
    }

    /// The underlying reconciler.
    pub fn reconciler(&self) -> &Reconciler<R> {
        &self.reconciler
    }

    /// Subscription channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn emit_records(&mut self) {
        let records = self.reconciler.records();
        self.sink.send(LiveUpdate::Records(records));
    }

    fn emit_changes(&mut self) {
        for change in self.reconciler.take_changes() {
            self.sink.send(LiveUpdate::Change(change));
        }
    }

    /// Report an error that did not come from the reconciler itself.
    fn report_error(&mut self, e: ReplicaError) {
        metrics::record_error(self.reconciler.table(), e.kind());
        self.sink.send(LiveUpdate::Error(e));
    }
}
