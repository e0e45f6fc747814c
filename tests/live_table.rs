//! Driver tests: snapshot source, subscription channel and sink wired
//! together through `run_live_table`.

mod common;

use common::*;
use live_table::{
    run_live_table, ChannelSink, LiveTableConfig, LiveUpdate, ReplicaError, RowChange, SourceError,
    StaticSnapshot, SubscriptionMessage, SubscriptionStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

fn config() -> LiveTableConfig {
    LiveTableConfig::new("thing", "type", "vehicle")
}

fn records_of(update: &LiveUpdate<ThingRow>) -> Vec<(i64, String)> {
    match update {
        LiveUpdate::Records(rows) => names(rows),
        other => panic!("expected records, got {other:?}"),
    }
}

/// Wait until the driver has reported `count` updates.
async fn recv_n(
    rx: &mut mpsc::UnboundedReceiver<LiveUpdate<ThingRow>>,
    count: usize,
) -> Vec<LiveUpdate<ThingRow>> {
    let mut updates = Vec::with_capacity(count);
    while updates.len() < count {
        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("sink closed");
        updates.push(update);
    }
    updates
}

#[tokio::test]
async fn test_events_before_snapshot_are_replayed() {
    let (source, gate) = GatedSnapshot::<ThingRow>::new();
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_live_table(
        config(),
        Arc::clone(&source),
        ChannelSink::new(sink_tx),
        events_rx,
        shutdown_rx,
    ));

    events_tx
        .send(SubscriptionMessage::Status(SubscriptionStatus::Subscribed))
        .await
        .unwrap();
    // Older than the snapshot: discarded.
    events_tx.send(update(thing_updated(1, "Bike", 1, 2)).into()).await.unwrap();
    // Newer than the snapshot: kept.
    events_tx.send(insert(thing(2, "Car", 5)).into()).await.unwrap();

    // Give the driver a chance to buffer both events.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain_updates(&mut sink_rx).is_empty());

    gate.send(Ok(vec![thing_updated(1, "Bicycle", 1, 3)])).unwrap();
    let updates = recv_n(&mut sink_rx, 1).await;
    assert_eq!(records_of(&updates[0]), expect(&[(1, "Bicycle"), (2, "Car")]));

    // Live from here on.
    events_tx.send(delete(2, 6).into()).await.unwrap();
    let updates = recv_n(&mut sink_rx, 1).await;
    assert_eq!(records_of(&updates[0]), expect(&[(1, "Bicycle")]));

    shutdown_tx.send(true).unwrap();
    let table = handle.await.unwrap();
    assert!(table.is_stopped());
    assert_eq!(source.fetch_count(), 1);

    let filter = source.last_filter().unwrap();
    assert_eq!(filter.table, "thing");
    assert_eq!(filter.column, "type");
    assert_eq!(filter.value, serde_json::json!("vehicle"));
}

#[tokio::test]
async fn test_snapshot_error_is_reported() {
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel::<SubscriptionMessage<ThingRow>>(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(events_tx);

    let table = run_live_table(
        config(),
        Arc::new(StaticSnapshot::failing("permission denied for table thing")),
        ChannelSink::new(sink_tx),
        events_rx,
        shutdown_rx,
    )
    .await;

    assert_eq!(
        drain_updates(&mut sink_rx),
        vec![LiveUpdate::Error(ReplicaError::Snapshot(
            "permission denied for table thing".to_string()
        ))]
    );
    assert!(!table.reconciler().is_live());
}

#[tokio::test]
async fn test_integrity_errors_reported_and_table_keeps_running() {
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_live_table(
        config(),
        Arc::new(StaticSnapshot::new(vec![thing(1, "Bicycle", 1)])),
        ChannelSink::new(sink_tx),
        events_rx,
        shutdown_rx,
    ));

    let updates = recv_n(&mut sink_rx, 1).await;
    assert_eq!(records_of(&updates[0]), expect(&[(1, "Bicycle")]));

    events_tx.send(insert(thing(1, "Bike", 2)).into()).await.unwrap();
    events_tx.send(update(thing_updated(3, "Truck", 1, 2)).into()).await.unwrap();
    events_tx.send(insert(thing(3, "Truck", 4)).into()).await.unwrap();
    drop(events_tx);

    let updates = recv_n(&mut sink_rx, 3).await;
    assert!(matches!(
        updates[0],
        LiveUpdate::Error(ReplicaError::ConflictingInsert { .. })
    ));
    assert!(matches!(
        updates[1],
        LiveUpdate::Error(ReplicaError::MissingRecord { .. })
    ));
    assert_eq!(records_of(&updates[2]), expect(&[(1, "Bicycle"), (3, "Truck")]));

    // Channel closed and snapshot resolved: the driver exits on its own.
    let table = handle.await.unwrap();
    assert_eq!(table.records().len(), 2);
    assert_eq!(table.reconciler().stats().errors, 2);
}

#[tokio::test]
async fn test_subscription_failure_is_reported() {
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_live_table(
        config(),
        Arc::new(StaticSnapshot::new(Vec::<ThingRow>::new())),
        ChannelSink::new(sink_tx),
        events_rx,
        shutdown_rx,
    ));

    recv_n(&mut sink_rx, 1).await;
    events_tx
        .send(SubscriptionStatus::ChannelError("socket closed".to_string()).into())
        .await
        .unwrap();
    drop(events_tx);

    let updates = recv_n(&mut sink_rx, 1).await;
    assert_eq!(
        updates[0],
        LiveUpdate::Error(ReplicaError::subscription(
            "thing:vehicle",
            "CHANNEL_ERROR: socket closed"
        ))
    );
    handle.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_drops_pending_snapshot() {
    let (source, gate) = GatedSnapshot::<ThingRow>::new();
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_live_table(
        config(),
        source,
        ChannelSink::new(sink_tx),
        events_rx,
        shutdown_rx,
    ));

    events_tx.send(insert(thing(1, "Bike", 1)).into()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown_tx.send(true).unwrap();
    let table = handle.await.unwrap();

    // Released after teardown: nobody is listening and nothing is applied.
    let _ = gate.send(Ok(vec![thing(1, "Bike", 1)]));

    assert!(table.is_stopped());
    assert!(table.records().is_empty());
    assert_eq!(table.reconciler().buffered_len(), 1);
    assert!(drain_updates(&mut sink_rx).is_empty());
}

#[tokio::test]
async fn test_dropped_gate_surfaces_as_snapshot_error() {
    let (source, gate) = GatedSnapshot::<ThingRow>::new();
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel::<SubscriptionMessage<ThingRow>>(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(events_tx);
    drop(gate);

    run_live_table(config(), source, ChannelSink::new(sink_tx), events_rx, shutdown_rx).await;

    let updates = drain_updates(&mut sink_rx);
    assert_eq!(updates.len(), 1);
    assert!(matches!(&updates[0], LiveUpdate::Error(ReplicaError::Snapshot(msg)) if msg.contains("dropped")));
}

#[tokio::test]
async fn test_row_changes_reported_through_driver() {
    let (source, gate) = GatedSnapshot::<ThingRow>::new();
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut config = config();
    config.settings.reconciler.record_changes = true;

    let handle = tokio::spawn(run_live_table(
        config,
        Arc::clone(&source),
        ChannelSink::new(sink_tx),
        events_rx,
        shutdown_rx,
    ));

    gate.send(Ok(vec![thing(1, "Bicycle", 1)])).unwrap();
    let updates = recv_n(&mut sink_rx, 2).await;
    assert_eq!(
        updates[0],
        LiveUpdate::Change(RowChange::Snapshot(vec![thing(1, "Bicycle", 1)]))
    );

    events_tx.send(update(thing_updated(1, "Bike", 1, 4)).into()).await.unwrap();
    events_tx.send(delete(1, 5).into()).await.unwrap();
    drop(events_tx);

    let updates = recv_n(&mut sink_rx, 4).await;
    assert_eq!(
        updates[0],
        LiveUpdate::Change(RowChange::Updated {
            old: thing(1, "Bicycle", 1),
            new: thing_updated(1, "Bike", 1, 4),
        })
    );
    assert_eq!(records_of(&updates[1]), expect(&[(1, "Bike")]));
    assert_eq!(
        updates[2],
        LiveUpdate::Change(RowChange::Deleted(thing_updated(1, "Bike", 1, 4)))
    );
    assert!(records_of(&updates[3]).is_empty());

    handle.await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_stops_before_fetching() {
    let (source, _gate) = GatedSnapshot::<ThingRow>::new();
    let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
    let (_events_tx, events_rx) = mpsc::channel::<SubscriptionMessage<ThingRow>>(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let table = run_live_table(
        LiveTableConfig::new("", "type", "vehicle"),
        Arc::clone(&source),
        ChannelSink::new(sink_tx),
        events_rx,
        shutdown_rx,
    )
    .await;

    assert!(table.is_stopped());
    assert_eq!(source.fetch_count(), 0);
    let updates = drain_updates(&mut sink_rx);
    assert_eq!(updates.len(), 1);
    assert!(matches!(&updates[0], LiveUpdate::Error(ReplicaError::Config(msg)) if msg.contains("table_name")));
}

#[test]
fn test_source_error_converts_to_snapshot_error() {
    let err: ReplicaError = SourceError("timeout expired".to_string()).into();
    assert_eq!(err.kind(), "snapshot");
    assert!(!err.is_integrity_violation());
}
