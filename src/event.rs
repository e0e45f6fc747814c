// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change events delivered by the subscription.
//!
//! Each event carries the commit timestamp the data source assigned to the
//! change. It is independent of, but expected to be at or after, the
//! record's own effective timestamp.

use crate::row::{DeletedRow, Row, RowId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Change operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Lowercase name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ChangeEvent<R> {
    /// A new row; `record` is the full row.
    Insert { record: R, timestamp: Timestamp },
    /// A modified row; `record` is the full new row.
    Update { record: R, timestamp: Timestamp },
    /// A removed row; `old` may carry nothing but the id, or not even that.
    Delete { old: DeletedRow, timestamp: Timestamp },
}

impl<R: Row> ChangeEvent<R> {
    /// Build an INSERT event.
    pub fn insert(record: R, timestamp: Timestamp) -> Self {
        ChangeEvent::Insert { record, timestamp }
    }

    /// Build an UPDATE event.
    pub fn update(record: R, timestamp: Timestamp) -> Self {
        ChangeEvent::Update { record, timestamp }
    }

    /// Build a DELETE event for an id.
    pub fn delete(id: impl Into<RowId>, timestamp: Timestamp) -> Self {
        ChangeEvent::Delete {
            old: DeletedRow::with_id(id),
            timestamp,
        }
    }

    /// The operation kind.
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Commit timestamp assigned by the data source.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            ChangeEvent::Insert { timestamp, .. }
            | ChangeEvent::Update { timestamp, .. }
            | ChangeEvent::Delete { timestamp, .. } => *timestamp,
        }
    }

    /// Id of the affected row, if the payload carries one.
    pub fn row_id(&self) -> Option<RowId> {
        match self {
            ChangeEvent::Insert { record, .. } | ChangeEvent::Update { record, .. } => {
                Some(record.id())
            }
            ChangeEvent::Delete { old, .. } => old.id.clone(),
        }
    }
}
