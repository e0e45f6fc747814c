//! Async driver: feeds a [`LiveTable`] from a snapshot source and a
//! subscription channel.
//!
//! The snapshot query and the subscription start together. Whichever
//! delivers first, the host sees the inputs one at a time from a single
//! `tokio::select!` loop.
//!
//! # Exit Conditions
//!
//! 1. Invalid config (reported as [`ReplicaError::Config`], nothing is fetched)
//! 2. Shutdown signal (`watch` channel set to `true`)
//! 3. Subscription channel closed AND the snapshot has resolved
//!
//! On exit the host is stopped and returned for inspection. A snapshot still
//! in flight at shutdown is dropped without being applied.

use super::{LiveTable, RecordsSink};
use crate::config::LiveTableConfig;
use crate::error::{ReplicaError, Result};
use crate::metrics;
use crate::row::Row;
use crate::source::{Filter, SnapshotSource, SubscriptionMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};

/// Run a live table until shutdown or until the subscription ends.
pub async fn run_live_table<R, S, Src>(
    config: LiveTableConfig,
    source: Arc<Src>,
    sink: S,
    mut events_rx: mpsc::Receiver<SubscriptionMessage<R>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> LiveTable<R, S>
where
    R: Row,
    S: RecordsSink<R>,
    Src: SnapshotSource<R> + ?Sized,
{
    let span = info_span!("live_table", table = %config.table_name, channel = %config.channel());

    async move {
        let mut table = LiveTable::new(&config, sink);
        let timeout = match config.validate().and_then(|()| config.settings.parse_snapshot_timeout()) {
            Ok(timeout) => timeout,
            Err(e) => {
                warn!(error = %e, "Invalid live table config");
                table.report_error(e);
                table.stop();
                return table;
            }
        };
        let filter = config.filter();

        info!(filter = %filter, timeout_ms = timeout.as_millis() as u64, "Starting live table");

        let fetch = fetch_snapshot(source.as_ref(), &filter, timeout, &config.table_name);
        tokio::pin!(fetch);

        let mut snapshot_done = false;
        let mut events_open = true;
        let mut shutdown_open = true;

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received");
                break;
            }
            if snapshot_done && !events_open {
                info!("Subscription ended, stopping");
                break;
            }

            tokio::select! {
                biased;

                // Priority: check shutdown first
                changed = shutdown_rx.changed(), if shutdown_open => {
                    if changed.is_err() {
                        // Sender gone; no shutdown can arrive any more.
                        shutdown_open = false;
                    }
                }

                result = &mut fetch, if !snapshot_done => {
                    snapshot_done = true;
                    table.on_snapshot(result);
                }

                msg = events_rx.recv(), if events_open => {
                    match msg {
                        Some(SubscriptionMessage::Change(event)) => table.on_event(event),
                        Some(SubscriptionMessage::Status(status)) => table.on_status(status),
                        None => {
                            debug!("Subscription channel closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        table.stop();
        table
    }
    .instrument(span)
    .await
}

/// Query the snapshot, bounded by `timeout`.
async fn fetch_snapshot<R, Src>(
    source: &Src,
    filter: &Filter,
    timeout: Duration,
    table: &str,
) -> Result<Vec<R>>
where
    Src: SnapshotSource<R> + ?Sized,
{
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, source.fetch(filter)).await {
        Ok(Ok(rows)) => {
            debug!(rows = rows.len(), "Snapshot fetched");
            Ok(rows)
        }
        Ok(Err(e)) => Err(ReplicaError::from(e)),
        Err(_) => Err(ReplicaError::SnapshotTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    };
    metrics::record_snapshot_fetch_latency(table, started.elapsed());
    result
}
