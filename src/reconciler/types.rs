//! Reconciler state types.
//!
//! # State Transitions
//!
//! ```text
//!               submit_snapshot() (first)
//! Buffering ───────────────────────────────→ Live
//!    │ ▲                                      │ ▲
//!    └─┘ submit_event(): queue                └─┘ submit_event(): apply
//!                                                 submit_snapshot(): merge
//! ```
//!
//! There is no way back from `Live`.

use crate::error::ReplicaError;
use crate::row::Timestamp;

/// Lifecycle phase of a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No snapshot yet. Events are queued, the replica is empty.
    Buffering,

    /// A snapshot has been applied. Events are applied on arrival.
    Live,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Buffering => write!(f, "Buffering"),
            Phase::Live => write!(f, "Live"),
        }
    }
}

/// What happened to a single change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Queued until the first snapshot.
    Buffered,
    /// New row stored.
    Inserted,
    /// Stored row replaced.
    Updated,
    /// Stored row removed.
    Deleted,
    /// INSERT of a row already stored with the same effective timestamp.
    Duplicate,
    /// Older than what the replica already holds for the row.
    Stale,
    /// DELETE for a row the replica does not hold.
    Absent,
}

impl Applied {
    /// Check if the replica changed.
    pub fn changed(&self) -> bool {
        matches!(self, Applied::Inserted | Applied::Updated | Applied::Deleted)
    }

    /// Lowercase name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Applied::Buffered => "buffered",
            Applied::Inserted => "inserted",
            Applied::Updated => "updated",
            Applied::Deleted => "deleted",
            Applied::Duplicate => "duplicate",
            Applied::Stale => "stale",
            Applied::Absent => "absent",
        }
    }
}

/// A row-level change, recorded when `record_changes` is on.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange<R> {
    /// Rows a snapshot wrote, before any buffered event replays.
    Snapshot(Vec<R>),
    /// A new row was stored.
    Inserted(R),
    /// `old` was replaced by `new`.
    Updated { old: R, new: R },
    /// The stored row was removed.
    Deleted(R),
}

/// Result of applying a snapshot and replaying the buffer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplayReport {
    /// Maximum effective timestamp across the snapshot rows.
    pub watermark: Timestamp,
    /// Number of rows in the snapshot.
    pub snapshot_rows: usize,
    /// Snapshot rows skipped because a newer version of the row was already
    /// held, either from an earlier input or earlier in the same snapshot.
    pub snapshot_skipped: usize,
    /// Buffered events that passed the replay filter and were applied.
    pub replayed: usize,
    /// Buffered events the replay filter discarded as stale.
    pub discarded: usize,
    /// Replayed events that changed the replica.
    pub changed: usize,
    /// Errors raised by individual replayed events.
    pub errors: Vec<ReplicaError>,
}

impl ReplayReport {
    /// Check if every replayed event applied without error.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Running counters for one reconciler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Snapshots applied.
    pub snapshots: u64,
    /// Events queued while buffering.
    pub buffered: u64,
    /// Events that changed the replica.
    pub changed: u64,
    /// Duplicate inserts absorbed.
    pub duplicates: u64,
    /// Stale updates/deletes absorbed.
    pub stale: u64,
    /// Deletes of absent rows.
    pub absent: u64,
    /// Buffered events discarded by the replay filter.
    pub discarded: u64,
    /// Integrity errors raised.
    pub errors: u64,
}

impl ReconcileStats {
    pub(crate) fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Buffered => self.buffered += 1,
            Applied::Inserted | Applied::Updated | Applied::Deleted => self.changed += 1,
            Applied::Duplicate => self.duplicates += 1,
            Applied::Stale => self.stale += 1,
            Applied::Absent => self.absent += 1,
        }
    }
}
