// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pre-snapshot event buffer.
//!
//! Holds change events that arrive before the first snapshot. Pure FIFO:
//! no deduplication, no bound. Which buffered events take effect is decided
//! by the reconciler at replay time.

use crate::event::ChangeEvent;
use std::collections::VecDeque;

/// FIFO queue of change events awaiting the first snapshot.
#[derive(Debug, Clone)]
pub struct EventBuffer<R> {
    events: VecDeque<ChangeEvent<R>>,
}

impl<R> Default for EventBuffer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> EventBuffer<R> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }

    /// Append an event in arrival order.
    pub fn push(&mut self, event: ChangeEvent<R>) {
        self.events.push_back(event);
    }

    /// Take every buffered event in arrival order, leaving the buffer empty.
    pub fn drain(&mut self) -> impl Iterator<Item = ChangeEvent<R>> + '_ {
        self.events.drain(..)
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
