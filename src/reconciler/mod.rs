// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Snapshot/change-stream reconciler.
//!
//! Merges two inputs that have no ordering guarantee relative to each
//! other:
//! - a point-in-time snapshot of every matching row, and
//! - a change stream that may start delivering before the snapshot lands.
//!
//! # Algorithm
//!
//! ```text
//! submit_event ──▶ Buffering? ──yes──▶ EventBuffer (FIFO)
//!                      │
//!                      no
//!                      ▼
//!                per-kind rules ──▶ ReplicaStore
//!                      ▲
//! submit_snapshot ─────┤ 1. watermark = max effective timestamp
//!                      │ 2. overwrite store with snapshot rows,
//!                      │    never with an older version of a row
//!                      │ 3. Buffering → Live
//!                      └ 4. replay buffer, skipping events the
//!                           replay filter proves stale
//! ```
//!
//! # Per-kind Rules
//!
//! | Event | Row absent | Row present |
//! |-------|------------|-------------|
//! | INSERT | insert | same effective ts: duplicate; different: `ConflictingInsert` |
//! | UPDATE | `MissingRecord` | replace unless incoming is older (stale) |
//! | DELETE | no-op | remove unless the stored row is newer than the delete (stale) |
//!
//! A DELETE without an id is `MalformedDelete`. Errors never mutate the
//! replica, and the reconciler remains usable after one.
//!
//! # Change Log
//!
//! With `record_changes` set, every mutation is also recorded as a
//! [`RowChange`] until the caller collects it with
//! [`take_changes`](Reconciler::take_changes).
//!
//! # Concurrency
//!
//! Single writer. The reconciler does no locking and never blocks; the
//! caller serializes `submit_event` and `submit_snapshot`.

mod types;

pub use types::{Applied, Phase, ReconcileStats, ReplayReport, RowChange};

use crate::buffer::EventBuffer;
use crate::config::{ReconcilerConfig, ReplayPolicy};
use crate::error::{ReplicaError, Result};
use crate::event::ChangeEvent;
use crate::metrics;
use crate::row::{DeletedRow, Row, RowId, Timestamp};
use crate::store::ReplicaStore;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

/// Maximum effective timestamp across `rows`; the epoch when empty.
pub fn snapshot_watermark<R: Row>(rows: &[R]) -> Timestamp {
    rows.iter()
        .map(Row::effective_timestamp)
        .max()
        .unwrap_or(Timestamp::EPOCH)
}

/// Maintains a replica of one filtered table.
pub struct Reconciler<R: Row> {
    /// Table name (for logging and metrics labels).
    table: String,
    config: ReconcilerConfig,
    phase: Phase,
    store: ReplicaStore<R>,
    buffer: EventBuffer<R>,
    /// Highest snapshot watermark seen so far.
    watermark: Option<Timestamp>,
    stats: ReconcileStats,
    /// Set once the buffer crosses the warn threshold.
    buffer_warned: bool,
    changes: Vec<RowChange<R>>,
}

impl<R: Row> Reconciler<R> {
    /// Create a reconciler with default settings, in `Buffering`.
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_config(table, ReconcilerConfig::default())
    }

    /// Create a reconciler with explicit settings, in `Buffering`.
    pub fn with_config(table: impl Into<String>, config: ReconcilerConfig) -> Self {
        let table = table.into();
        metrics::set_phase(&table, Phase::Buffering);
        Self {
            table,
            config,
            phase: Phase::Buffering,
            store: ReplicaStore::new(),
            buffer: EventBuffer::new(),
            watermark: None,
            stats: ReconcileStats::default(),
            buffer_warned: false,
            changes: Vec::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Inputs
    // ═══════════════════════════════════════════════════════════════════════════

    /// Submit a change event.
    ///
    /// While buffering the event is queued and `Applied::Buffered` returned.
    /// Once live it is applied immediately.
    pub fn submit_event(&mut self, event: ChangeEvent<R>) -> Result<Applied> {
        metrics::record_event_received(&self.table, event.kind().as_str());

        match self.phase {
            Phase::Buffering => {
                trace!(
                    table = %self.table,
                    kind = %event.kind(),
                    timestamp = %event.timestamp(),
                    "Buffering event until snapshot"
                );
                self.buffer.push(event);
                self.stats.record(Applied::Buffered);
                metrics::record_event_buffered(&self.table);
                metrics::set_buffered_events(&self.table, self.buffer.len());
                self.check_buffer_threshold();
                Ok(Applied::Buffered)
            }
            Phase::Live => {
                let result = self.apply(event);
                metrics::set_replica_rows(&self.table, self.store.len());
                result
            }
        }
    }

    /// Submit a snapshot.
    ///
    /// The first snapshot switches the reconciler to `Live` and replays the
    /// buffer. Every snapshot merges row by row and never regresses a row,
    /// including when the same id appears more than once in `rows`. Rows
    /// absent from the snapshot are kept; only DELETE events remove.
    #[instrument(skip(self, rows), fields(table = %self.table, rows = rows.len()))]
    pub fn submit_snapshot(&mut self, rows: Vec<R>) -> ReplayReport {
        let started = Instant::now();
        let watermark = snapshot_watermark(&rows);
        let mut report = ReplayReport {
            watermark,
            snapshot_rows: rows.len(),
            ..Default::default()
        };

        let row_marks = if self.config.replay_policy == ReplayPolicy::PerRow && !self.buffer.is_empty() {
            row_watermarks(&rows)
        } else {
            HashMap::new()
        };

        let was_live = self.phase == Phase::Live;
        let mut written = Vec::new();
        for row in rows {
            let id = row.id();
            if let Some(existing) = self.store.get(&id) {
                if row.effective_timestamp() < existing.effective_timestamp() {
                    debug!(
                        table = %self.table,
                        id = %id,
                        "Snapshot row older than replica, keeping replica"
                    );
                    report.snapshot_skipped += 1;
                    continue;
                }
            }
            if self.config.record_changes {
                written.push(row.clone());
            }
            self.store.set(id, row);
        }
        if self.config.record_changes {
            self.changes.push(RowChange::Snapshot(written));
        }

        self.stats.snapshots += 1;
        self.watermark = Some(self.watermark.map_or(watermark, |w| w.max(watermark)));

        if !was_live {
            self.phase = Phase::Live;
            metrics::set_phase(&self.table, Phase::Live);
            info!(
                table = %self.table,
                watermark = %watermark,
                buffered = self.buffer.len(),
                "First snapshot received, going live"
            );
        }

        let mut buffered = std::mem::take(&mut self.buffer);
        for event in buffered.drain() {
            if is_known_stale(self.config.replay_policy, &event, watermark, &row_marks) {
                debug!(
                    table = %self.table,
                    kind = %event.kind(),
                    timestamp = %event.timestamp(),
                    watermark = %watermark,
                    "Discarding buffered event older than snapshot"
                );
                report.discarded += 1;
                self.stats.discarded += 1;
                metrics::record_event_outcome(&self.table, "discarded");
                continue;
            }

            report.replayed += 1;
            match self.apply(event) {
                Ok(applied) => {
                    if applied.changed() {
                        report.changed += 1;
                    }
                }
                Err(e) => report.errors.push(e),
            }
        }
        self.buffer_warned = false;

        metrics::set_buffered_events(&self.table, 0);
        metrics::set_replica_rows(&self.table, self.store.len());
        metrics::record_replay(&self.table, report.replayed, report.discarded);
        metrics::record_snapshot_applied(&self.table, report.snapshot_rows, started.elapsed());

        info!(
            table = %self.table,
            watermark = %watermark,
            replayed = report.replayed,
            discarded = report.discarded,
            errors = report.errors.len(),
            replica_rows = self.store.len(),
            "Snapshot applied"
        );

        report
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Per-kind rules
    // ═══════════════════════════════════════════════════════════════════════════

    fn apply(&mut self, event: ChangeEvent<R>) -> Result<Applied> {
        let kind = event.kind();
        let result = match event {
            ChangeEvent::Insert { record, .. } => self.apply_insert(record),
            ChangeEvent::Update { record, .. } => self.apply_update(record),
            ChangeEvent::Delete { old, timestamp } => self.apply_delete(old, timestamp),
        };

        match &result {
            Ok(applied) => {
                self.stats.record(*applied);
                metrics::record_event_outcome(&self.table, applied.as_str());
                debug!(table = %self.table, kind = %kind, outcome = applied.as_str(), "Applied change event");
            }
            Err(e) => {
                self.stats.errors += 1;
                metrics::record_error(&self.table, e.kind());
                warn!(table = %self.table, kind = %kind, error = %e, "Rejected change event");
            }
        }

        result
    }

    fn apply_insert(&mut self, record: R) -> Result<Applied> {
        let id = record.id();
        match self.store.get(&id) {
            None => {
                if self.config.record_changes {
                    self.changes.push(RowChange::Inserted(record.clone()));
                }
                self.store.set(id, record);
                Ok(Applied::Inserted)
            }
            Some(existing) => {
                let existing = existing.effective_timestamp();
                let incoming = record.effective_timestamp();
                if existing == incoming {
                    Ok(Applied::Duplicate)
                } else {
                    Err(ReplicaError::ConflictingInsert {
                        id,
                        existing,
                        incoming,
                    })
                }
            }
        }
    }

    fn apply_update(&mut self, record: R) -> Result<Applied> {
        let id = record.id();
        let existing = match self.store.get(&id) {
            Some(existing) => existing.effective_timestamp(),
            None => return Err(ReplicaError::MissingRecord { id }),
        };

        // Equal timestamps re-apply.
        if record.effective_timestamp() < existing {
            return Ok(Applied::Stale);
        }

        let new = self.config.record_changes.then(|| record.clone());
        let old = self.store.set(id, record);
        if let (Some(old), Some(new)) = (old, new) {
            self.changes.push(RowChange::Updated { old, new });
        }
        Ok(Applied::Updated)
    }

    fn apply_delete(&mut self, old: DeletedRow, timestamp: Timestamp) -> Result<Applied> {
        let id = old.id.ok_or(ReplicaError::MalformedDelete)?;
        let existing = match self.store.get(&id) {
            Some(existing) => existing.effective_timestamp(),
            None => return Ok(Applied::Absent),
        };

        if timestamp < existing {
            return Ok(Applied::Stale);
        }

        if let Some(old) = self.store.remove(&id) {
            if self.config.record_changes {
                self.changes.push(RowChange::Deleted(old));
            }
        }
        Ok(Applied::Deleted)
    }

    fn check_buffer_threshold(&mut self) {
        let threshold = self.config.buffer_warn_threshold;
        if threshold > 0 && !self.buffer_warned && self.buffer.len() >= threshold {
            self.buffer_warned = true;
            warn!(
                table = %self.table,
                buffered = self.buffer.len(),
                threshold,
                "Event buffer is large, snapshot still pending"
            );
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════════

    /// Copy of all replica rows, in no particular order.
    pub fn records(&self) -> Vec<R> {
        self.store.values()
    }

    /// Get the replica row at `id`.
    pub fn get(&self, id: &RowId) -> Option<&R> {
        self.store.get(id)
    }

    /// Number of replica rows.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the replica is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Check if a snapshot has been applied.
    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
    }

    /// Number of events waiting for the first snapshot.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Highest snapshot watermark seen, `None` before the first snapshot.
    pub fn watermark(&self) -> Option<Timestamp> {
        self.watermark
    }

    /// Running counters.
    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Take the row changes recorded since the last call, oldest first.
    ///
    /// Always empty unless `record_changes` is set.
    pub fn take_changes(&mut self) -> Vec<RowChange<R>> {
        std::mem::take(&mut self.changes)
    }
}

/// Effective timestamp per row id in a snapshot (max on duplicate ids).
fn row_watermarks<R: Row>(rows: &[R]) -> HashMap<RowId, Timestamp> {
    let mut marks: HashMap<RowId, Timestamp> = HashMap::with_capacity(rows.len());
    for row in rows {
        let ts = row.effective_timestamp();
        marks
            .entry(row.id())
            .and_modify(|mark| *mark = (*mark).max(ts))
            .or_insert(ts);
    }
    marks
}

/// Replay filter: is this buffered event already superseded by the snapshot?
fn is_known_stale<R: Row>(
    policy: ReplayPolicy,
    event: &ChangeEvent<R>,
    watermark: Timestamp,
    row_marks: &HashMap<RowId, Timestamp>,
) -> bool {
    let ts = event.timestamp();
    match policy {
        ReplayPolicy::Watermark => ts < watermark,
        ReplayPolicy::PerRow => event
            .row_id()
            .and_then(|id| row_marks.get(&id).copied())
            .is_some_and(|mark| ts < mark),
    }
}
