//! # Live Table
//!
//! Keeps an in-memory replica of a filtered table consistent by merging a
//! one-shot snapshot query with a change-event subscription that may start
//! delivering before the snapshot lands.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                               live-table                                  │
//! │                                                                           │
//! │  ┌────────────────┐                                                       │
//! │  │ SnapshotSource │──┐     ┌──────────────────────────────────────────┐   │
//! │  └────────────────┘  │     │ LiveTable (host)                         │   │
//! │                      ├────►│  ┌────────────┐  ┌────────────────────┐  │   │
//! │  ┌────────────────┐  │     │  │ Reconciler │─►│ ReplicaStore       │  │   │
//! │  │ Subscription   │──┘     │  │            │  │ (id -> row)        │  │──►│ RecordsSink
//! │  │ (mpsc channel) │        │  │            │─►│ EventBuffer (FIFO) │  │   │
//! │  └────────────────┘        │  └────────────┘  └────────────────────┘  │   │
//! │                            └──────────────────────────────────────────┘   │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Phases
//!
//! 1. **Buffering**: no snapshot yet. Change events are queued.
//! 2. **Live**: the snapshot has been applied, the queue replayed, and every
//!    later event is applied on arrival.
//!
//! Conflicts are resolved by each row's effective timestamp (`updated_at`,
//! falling back to `created_at`).
//!
//! ## Usage
//!
//! ```rust
//! use live_table::{ChangeEvent, DynamicRow, Reconciler, Timestamp};
//!
//! let ts = Timestamp::from_micros;
//! let mut replica: Reconciler<DynamicRow> = Reconciler::new("thing");
//!
//! // Arrives before the snapshot: buffered.
//! replica
//!     .submit_event(ChangeEvent::insert(DynamicRow::new(2, ts(3)), ts(3)))
//!     .unwrap();
//!
//! let report = replica.submit_snapshot(vec![DynamicRow::new(1, ts(1))]);
//! assert_eq!(report.replayed, 1);
//! assert_eq!(replica.records().len(), 2);
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod live;
pub mod metrics;
pub mod reconciler;
pub mod row;
pub mod source;
pub mod store;

// Re-exports for convenience
pub use config::{LiveTableConfig, LiveTableSettings, ReconcilerConfig, ReplayPolicy};
pub use error::{ReplicaError, Result};
pub use event::{ChangeEvent, ChangeKind};
pub use live::driver::run_live_table;
pub use live::{ChannelSink, LiveTable, LiveUpdate, RecordsSink};
pub use reconciler::{Applied, Phase, ReconcileStats, Reconciler, ReplayReport, RowChange};
pub use row::{DeletedRow, DynamicRow, Row, RowId, Timestamp};
pub use source::{
    BoxFuture, Filter, SnapshotSource, SourceError, SourceResult, StaticSnapshot,
    SubscriptionMessage, SubscriptionStatus,
};
