// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Data source integration traits.
//!
//! A live table needs two things from the data source:
//! 1. A one-shot snapshot of every row matching a [`Filter`] ([`SnapshotSource`])
//! 2. A stream of [`SubscriptionMessage`]s for the same filter, delivered
//!    over an mpsc channel
//!
//! Neither transport is part of this crate. Callers adapt their client to
//! [`SnapshotSource`] and forward subscription callbacks into the channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use live_table::row::DynamicRow;
//! use live_table::source::{BoxFuture, Filter, SnapshotSource, SourceError, SourceResult};
//!
//! struct MyClient { /* ... */ }
//!
//! impl SnapshotSource<DynamicRow> for MyClient {
//!     fn fetch(&self, filter: &Filter) -> BoxFuture<'_, Vec<DynamicRow>> {
//!         let query = format!("{}.{} = {}", filter.table, filter.column, filter.value);
//!         Box::pin(async move {
//!             let rows: SourceResult<Vec<DynamicRow>> =
//!                 Err(SourceError(format!("not connected: {query}")));
//!             rows
//!         })
//!     }
//! }
//! ```

use crate::event::ChangeEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for data source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = SourceResult<T>> + Send + 'a>>;

/// Simplified error for data source operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError(pub String);

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SourceError {}

/// Equality filter shared by the snapshot and the subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub table: String,
    pub column: String,
    pub value: serde_json::Value,
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}={}", self.table, self.column, self.value)
    }
}

/// One-shot snapshot of the rows matching a filter.
///
/// Implementations are expected to return rows as of some point in time; the
/// reconciler takes care of events that race the query.
pub trait SnapshotSource<R>: Send + Sync + 'static {
    /// Fetch every row matching `filter`.
    fn fetch(&self, filter: &Filter) -> BoxFuture<'_, Vec<R>>;
}

impl<R, S> SnapshotSource<R> for Arc<S>
where
    S: SnapshotSource<R> + ?Sized,
{
    fn fetch(&self, filter: &Filter) -> BoxFuture<'_, Vec<R>> {
        (**self).fetch(filter)
    }
}

/// Fixed-rows snapshot source, for standalone use and tests.
#[derive(Debug, Clone)]
pub struct StaticSnapshot<R> {
    result: SourceResult<Vec<R>>,
}

impl<R> StaticSnapshot<R> {
    /// A source that always returns `rows`.
    pub fn new(rows: Vec<R>) -> Self {
        Self { result: Ok(rows) }
    }

    /// A source that always fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(SourceError(message.into())),
        }
    }
}

impl<R: Clone + Send + Sync + 'static> SnapshotSource<R> for StaticSnapshot<R> {
    fn fetch(&self, _filter: &Filter) -> BoxFuture<'_, Vec<R>> {
        let result = self.result.clone();
        Box::pin(async move { result })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Subscription side
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status of a change subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Subscription is established; events will follow.
    Subscribed,
    /// Subscribing did not complete in time.
    TimedOut,
    /// Transport reported an error.
    ChannelError(String),
    /// Subscription was closed by the server.
    Closed,
}

impl SubscriptionStatus {
    /// Check if this status ends the subscription.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubscriptionStatus::Subscribed)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionStatus::Subscribed => write!(f, "SUBSCRIBED"),
            SubscriptionStatus::TimedOut => write!(f, "TIMED_OUT"),
            SubscriptionStatus::ChannelError(msg) => write!(f, "CHANNEL_ERROR: {}", msg),
            SubscriptionStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A message delivered by the change subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionMessage<R> {
    Change(ChangeEvent<R>),
    Status(SubscriptionStatus),
}

impl<R> From<ChangeEvent<R>> for SubscriptionMessage<R> {
    fn from(event: ChangeEvent<R>) -> Self {
        SubscriptionMessage::Change(event)
    }
}

impl<R> From<SubscriptionStatus> for SubscriptionMessage<R> {
    fn from(status: SubscriptionStatus) -> Self {
        SubscriptionMessage::Status(status)
    }
}
