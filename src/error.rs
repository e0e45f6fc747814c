// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the live table.
//!
//! Errors are split by where they come from: the reconciliation rules
//! themselves (integrity violations reported by the change stream), or the
//! collaborators that feed the reconciler (snapshot source, subscription,
//! configuration).
//!
//! # Error Categories
//!
//! | Error Type | Integrity | Description |
//! |------------|-----------|-------------|
//! | `ConflictingInsert` | Yes | INSERT collides with a row of a different effective timestamp |
//! | `MissingRecord` | Yes | UPDATE for a row the replica never saw |
//! | `MalformedDelete` | Yes | DELETE payload without an id |
//! | `Snapshot` | No | Snapshot source returned an error |
//! | `SnapshotTimeout` | No | Snapshot fetch exceeded its configured bound |
//! | `Subscription` | No | Change subscription failed (timeout, channel error) |
//! | `InvalidTimestamp` | No | Timestamp could not be parsed |
//! | `Config` | No | Configuration invalid |
//!
//! Integrity violations are terminal for the single operation that raised
//! them. The replica is left untouched and the reconciler keeps accepting
//! input. None of these errors is retried by the engine.

use crate::row::{RowId, Timestamp};
use crate::source::SourceError;
use thiserror::Error;

/// Result type alias for live table operations.
pub type Result<T> = std::result::Result<T, ReplicaError>;

/// Errors surfaced by the reconciler and its host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicaError {
    /// An INSERT event names an id that is already present with a
    /// different effective timestamp.
    ///
    /// A correct upstream never produces this. It is reported instead of
    /// silently resolved.
    #[error("Conflicting insert for id {id}: existing row at {existing}, incoming row at {incoming}")]
    ConflictingInsert {
        id: RowId,
        existing: Timestamp,
        incoming: Timestamp,
    },

    /// An UPDATE event names an id absent from the replica.
    #[error("Update for missing record {id}")]
    MissingRecord { id: RowId },

    /// A DELETE event whose partial row carries no id.
    #[error("Deleted record has no id")]
    MalformedDelete,

    /// The snapshot source failed. The replica is not mutated.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// The snapshot fetch did not complete within its bound.
    #[error("Snapshot timed out after {timeout_ms}ms")]
    SnapshotTimeout { timeout_ms: u64 },

    /// Terminal failure reported by the change subscription.
    #[error("Subscription error ({channel}): {message}")]
    Subscription { channel: String, message: String },

    /// A timestamp string could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReplicaError {
    /// Create a subscription error for a channel.
    pub fn subscription(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subscription {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Check if this error signals an upstream data-integrity problem
    /// (as opposed to a collaborator failure).
    pub fn is_integrity_violation(&self) -> bool {
        match self {
            Self::ConflictingInsert { .. } => true,
            Self::MissingRecord { .. } => true,
            Self::MalformedDelete => true,
            Self::Snapshot(_) => false,
            Self::SnapshotTimeout { .. } => false,
            Self::Subscription { .. } => false,
            Self::InvalidTimestamp(_) => false,
            Self::Config(_) => false,
        }
    }

    /// Short stable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConflictingInsert { .. } => "conflicting_insert",
            Self::MissingRecord { .. } => "missing_record",
            Self::MalformedDelete => "malformed_delete",
            Self::Snapshot(_) => "snapshot",
            Self::SnapshotTimeout { .. } => "snapshot_timeout",
            Self::Subscription { .. } => "subscription",
            Self::InvalidTimestamp(_) => "invalid_timestamp",
            Self::Config(_) => "config",
        }
    }
}

impl From<SourceError> for ReplicaError {
    fn from(e: SourceError) -> Self {
        ReplicaError::Snapshot(e.0)
    }
}
