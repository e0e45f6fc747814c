// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replica store: the externally visible `id -> row` map.
//!
//! The store has no opinion about timestamps or conflicts. Those rules
//! live in the reconciler; the store only sets, removes and copies out.

use crate::row::RowId;
use std::collections::HashMap;

/// In-memory map from row id to the row currently believed correct.
#[derive(Debug, Clone)]
pub struct ReplicaStore<R> {
    rows: HashMap<RowId, R>,
}

impl<R: Clone> Default for ReplicaStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Clone> ReplicaStore<R> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    /// Insert or overwrite the row at `id`, returning the row it replaced.
    pub fn set(&mut self, id: RowId, row: R) -> Option<R> {
        self.rows.insert(id, row)
    }

    /// Remove the row at `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: &RowId) -> Option<R> {
        self.rows.remove(id)
    }

    /// Get the row at `id`.
    pub fn get(&self, id: &RowId) -> Option<&R> {
        self.rows.get(id)
    }

    /// Copy of all current rows, in no particular order.
    ///
    /// The returned vector is owned by the caller and unaffected by later
    /// mutation of the store.
    pub fn values(&self) -> Vec<R> {
        self.rows.values().cloned().collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
